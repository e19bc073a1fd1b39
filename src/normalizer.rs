//! Turns the model's free-form answer into structured steps.
//!
//! The model is asked for `[{ "step": 1, "explaination": "..." }, ...]` but
//! does not reliably comply. Decoding is attempted on the whole text first and
//! then on the widest `[...]` span inside it. Entries that survive decoding are
//! classified one by one:
//! - entries that are not objects, or carry no string `explaination`, are dropped
//! - entries mentioning "final answer" feed the extracted final answer and are
//!   never returned as steps
//! - everything else becomes a [`NormalizedStep`] with a `title: equation` split

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Number, Value};

use crate::io_struct::NormalizedStep;

/// Field name the upstream prompt asks for (spelling included).
pub const EXPLANATION_FIELD: &str = "explaination";
pub const FINAL_ANSWER_SENTINEL: &str = "final answer";

static NUMBER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?[0-9]+(?:\.[0-9]+)?").expect("number token pattern"));

/// Outcome of decoding the raw model text.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Entries(Vec<Value>),
    Undecodable,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Normalized {
    pub parsed_ok: bool,
    pub steps: Vec<NormalizedStep>,
    pub final_answer: Option<Number>,
}

/// What a single upstream entry turned out to be.
#[derive(Debug, Clone, PartialEq)]
enum Classified {
    Step(NormalizedStep),
    /// Sentinel entry; `None` when it carried no numeric token.
    FinalAnswer(Option<Number>),
    Invalid(&'static str),
}

pub fn normalize(raw_text: &str) -> Normalized {
    let entries = match decode(raw_text) {
        Decoded::Entries(entries) => entries,
        Decoded::Undecodable => {
            debug!("Model output is not a JSON array ({} bytes)", raw_text.len());
            return Normalized::default();
        }
    };

    let mut final_answer = None;
    let steps = entries
        .iter()
        .filter_map(|entry| match classify(entry) {
            Classified::Step(step) => Some(step),
            Classified::FinalAnswer(found) => {
                // Later matches overwrite earlier ones; a numberless match keeps the old value.
                if found.is_some() {
                    final_answer = found;
                }
                None
            }
            Classified::Invalid(reason) => {
                warn!("Skipping invalid step ({}): {}", reason, entry);
                None
            }
        })
        .collect();

    Normalized {
        parsed_ok: true,
        steps,
        final_answer,
    }
}

/// Strict decode of the whole text, falling back to the first `[` .. last `]` span.
///
/// Only a syntax failure triggers the fallback: text that decodes to something
/// other than an array is undecodable as-is.
pub fn decode(raw_text: &str) -> Decoded {
    let value = serde_json::from_str::<Value>(raw_text).ok().or_else(|| {
        bracketed_span(raw_text).and_then(|span| serde_json::from_str::<Value>(span).ok())
    });

    match value {
        Some(Value::Array(entries)) => Decoded::Entries(entries),
        _ => Decoded::Undecodable,
    }
}

fn bracketed_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

fn classify(entry: &Value) -> Classified {
    let Some(fields) = entry.as_object() else {
        return Classified::Invalid("not an object");
    };
    let Some(explanation) = fields.get(EXPLANATION_FIELD).and_then(Value::as_str) else {
        return Classified::Invalid("explanation is not a string");
    };

    if is_final_answer(explanation) {
        return Classified::FinalAnswer(first_number(explanation));
    }

    let explanation = explanation.trim();
    if explanation.is_empty() {
        return Classified::Invalid("explanation is blank");
    }

    let (title, equation) = split_title(explanation);
    Classified::Step(NormalizedStep {
        step: fields.get("step").filter(|v| !v.is_null()).cloned(),
        title,
        explanation: explanation.to_string(),
        equation,
    })
}

pub fn is_final_answer(text: &str) -> bool {
    text.to_ascii_lowercase().contains(FINAL_ANSWER_SENTINEL)
}

/// First `-?digits(.digits)?` token, kept integral when it has no fraction.
pub fn first_number(text: &str) -> Option<Number> {
    let token = NUMBER_TOKEN.find(text)?.as_str();
    if !token.contains('.') {
        if let Ok(int) = token.parse::<i64>() {
            return Some(Number::from(int));
        }
    }
    token.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Splits `"Title: equation."` on the first colon.
///
/// Without a colon the whole text is the title. The equation is trimmed and
/// loses one trailing period; an empty remainder yields no equation.
pub fn split_title(explanation: &str) -> (String, Option<String>) {
    match explanation.split_once(':') {
        Some((title, rest)) => {
            let rest = rest.trim();
            let rest = rest.strip_suffix('.').unwrap_or(rest);
            let equation = (!rest.is_empty()).then(|| rest.to_string());
            (title.trim().to_string(), equation)
        }
        None => (explanation.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(step: i64, text: &str) -> Value {
        json!({ "step": step, "explaination": text })
    }

    #[test]
    fn test_plain_steps_keep_order_without_final_answer() {
        let raw = json!([
            entry(1, "Read the problem: x + 2 = 5."),
            entry(2, "Subtract two from both sides: x = 3."),
            entry(3, "Check the result"),
        ])
        .to_string();

        let out = normalize(&raw);
        assert!(out.parsed_ok);
        assert_eq!(out.final_answer, None);
        let titles: Vec<_> = out.steps.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Read the problem", "Subtract two from both sides", "Check the result"]
        );
        assert_eq!(out.steps[2].equation, None);
    }

    #[test]
    fn test_final_answer_entry_is_extracted_and_removed() {
        let raw = json!([
            entry(1, "Divide: -7 / 2."),
            entry(2, "Final answer: The answer is -3.5."),
        ])
        .to_string();

        let out = normalize(&raw);
        assert_eq!(out.final_answer, Number::from_f64(-3.5));
        assert_eq!(out.steps.len(), 1);
        assert_eq!(out.steps[0].step, Some(json!(1)));
    }

    #[test]
    fn test_quotient_rule_split() {
        let raw = json!([entry(2, "Apply the quotient rule: d/dx = (u'v-uv')/v^2.")]).to_string();

        let out = normalize(&raw);
        assert_eq!(
            out.steps,
            vec![NormalizedStep {
                step: Some(json!(2)),
                title: "Apply the quotient rule".to_string(),
                explanation: "Apply the quotient rule: d/dx = (u'v-uv')/v^2.".to_string(),
                equation: Some("d/dx = (u'v-uv')/v^2".to_string()),
            }]
        );
    }

    #[test]
    fn test_recovers_array_embedded_in_prose() {
        let raw = r#"Here is the answer: [{"step":1,"explaination":"Step one: x=1."}]"#;

        let out = normalize(raw);
        assert!(out.parsed_ok);
        assert_eq!(out.steps.len(), 1);
        assert_eq!(out.steps[0].title, "Step one");
        assert_eq!(out.steps[0].equation.as_deref(), Some("x=1"));
    }

    #[test]
    fn test_text_without_array_is_undecodable() {
        assert_eq!(decode("The answer is 4."), Decoded::Undecodable);
        assert_eq!(decode("] backwards ["), Decoded::Undecodable);
        assert_eq!(decode("[not json at all]"), Decoded::Undecodable);

        let out = normalize("The answer is 4.");
        assert!(!out.parsed_ok);
        assert!(out.steps.is_empty());
        assert_eq!(out.final_answer, None);
    }

    #[test]
    fn test_non_array_json_is_not_recovered() {
        let raw = r#"{"steps": [{"step": 1, "explaination": "x"}]}"#;
        assert_eq!(decode(raw), Decoded::Undecodable);
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let raw = json!([
            {"step": 1},
            "just a string",
            null,
            {"step": 2, "explaination": 42},
            {"step": 3, "explaination": "   "},
            entry(4, "Keep me: y = 2"),
        ])
        .to_string();

        let out = normalize(&raw);
        assert_eq!(out.steps.len(), 1);
        assert_eq!(out.steps[0].step, Some(json!(4)));
        assert_eq!(out.steps[0].equation.as_deref(), Some("y = 2"));
    }

    #[test]
    fn test_last_numeric_final_answer_wins() {
        let raw = json!([
            entry(1, "final answer is 10"),
            entry(2, "FINAL ANSWER: 12"),
            entry(3, "The final answer is unknown."),
        ])
        .to_string();

        let out = normalize(&raw);
        assert!(out.steps.is_empty());
        assert_eq!(out.final_answer, Some(Number::from(12)));
    }

    #[test]
    fn test_integer_final_answer_serializes_without_fraction() {
        let raw = json!([entry(1, "The final answer is 42.")]).to_string();
        let out = normalize(&raw);
        assert_eq!(serde_json::to_string(&out.final_answer).unwrap(), "42");
    }

    #[test]
    fn test_missing_step_number_is_null() {
        let raw = json!([{ "explaination": "No number here" }]).to_string();
        let out = normalize(&raw);
        assert_eq!(out.steps[0].step, None);
        assert_eq!(out.steps[0].title, "No number here");
    }

    #[test]
    fn test_split_title_edge_cases() {
        assert_eq!(split_title("Title:"), ("Title".to_string(), None));
        assert_eq!(split_title("Title: ."), ("Title".to_string(), None));
        assert_eq!(
            split_title("Ratio: 1:2."),
            ("Ratio".to_string(), Some("1:2".to_string()))
        );
        assert_eq!(
            split_title("Ends with two dots: x.."),
            ("Ends with two dots".to_string(), Some("x.".to_string()))
        );
    }

    #[test]
    fn test_renormalizing_steps_is_stable() {
        let raw = json!([
            entry(1, "  Factor the quadratic: (x-1)(x+2) = 0.  "),
            entry(2, "Solve each factor"),
        ])
        .to_string();
        let first = normalize(&raw);

        let again: Vec<Value> = first
            .steps
            .iter()
            .map(|s| json!({ "step": s.step, "explaination": s.explanation }))
            .collect();
        let second = normalize(&Value::Array(again).to_string());

        assert_eq!(first.steps, second.steps);
    }

    #[test]
    fn test_first_number_token() {
        assert_eq!(first_number("x is -3.5 or 7"), Number::from_f64(-3.5));
        assert_eq!(first_number("answer 007"), Some(Number::from(7)));
        assert_eq!(first_number("version 1."), Some(Number::from(1)));
        assert_eq!(first_number("no digits"), None);
    }
}

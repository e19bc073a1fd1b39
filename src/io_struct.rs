use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

pub const MISSING_FIELDS_MESSAGE: &str = "Both text and imageUrl are required.";
pub const NO_CONTENT_MESSAGE: &str = "Unexpected API response structure (no content).";
pub const NOT_AN_ARRAY_MESSAGE: &str = "Model output was not valid JSON array.";

/// Body of `POST /analyze`.
///
/// Both fields are untyped at the serde level so that a missing or mistyped
/// field is reported with the relay's own 400 message instead of a
/// deserializer error.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default, rename = "imageUrl")]
    pub image_url: Option<Value>,
}

impl AnalyzeRequest {
    /// Returns `(text, image_url)` when both are non-empty strings.
    pub fn required_fields(&self) -> Option<(&str, &str)> {
        Some((
            non_empty_str(self.text.as_ref())?,
            non_empty_str(self.image_url.as_ref())?,
        ))
    }
}

fn non_empty_str(field: Option<&Value>) -> Option<&str> {
    field
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedStep {
    pub step: Option<Value>,
    pub title: String,
    pub explanation: String,
    pub equation: Option<String>,
}

/// Every JSON body `/analyze` can answer with.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Analyzed {
        success: bool,
        steps: Vec<NormalizedStep>,
        #[serde(rename = "finalAnswer")]
        final_answer: Option<Number>,
        #[serde(rename = "rawText")]
        raw_text: String,
    },
    NotAnArray {
        success: bool,
        message: &'static str,
        #[serde(rename = "rawText")]
        raw_text: String,
        steps: Vec<NormalizedStep>,
        #[serde(rename = "finalAnswer")]
        final_answer: Option<Number>,
    },
    NoContent {
        success: bool,
        message: &'static str,
        raw: Value,
    },
    Failure {
        success: bool,
        message: String,
    },
}

impl AnalyzeResponse {
    pub fn analyzed(
        steps: Vec<NormalizedStep>,
        final_answer: Option<Number>,
        raw_text: String,
    ) -> Self {
        AnalyzeResponse::Analyzed {
            success: true,
            steps,
            final_answer,
            raw_text,
        }
    }

    pub fn not_an_array(raw_text: String) -> Self {
        AnalyzeResponse::NotAnArray {
            success: false,
            message: NOT_AN_ARRAY_MESSAGE,
            raw_text,
            steps: Vec::new(),
            final_answer: None,
        }
    }

    pub fn no_content(raw: Value) -> Self {
        AnalyzeResponse::NoContent {
            success: false,
            message: NO_CONTENT_MESSAGE,
            raw,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        AnalyzeResponse::Failure {
            success: false,
            message: message.into(),
        }
    }
}

// ============= Upstream chat-completions payload =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    System { content: String },
    User { content: Vec<ContentPart> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

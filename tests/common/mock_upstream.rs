//! Mock chat-completions server for testing

use actix_web::{dev::ServerHandle, http::StatusCode, web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the mock answers to every request
#[derive(Clone, Debug)]
pub enum MockBehavior {
    /// 200 with `choices[0].message.content` set to the given text
    Content(String),
    /// 200 with an arbitrary JSON body
    Body(Value),
    /// Non-2xx status with a JSON body
    Status(u16, Value),
    /// Sleeps before answering with the given content
    Delayed(Duration, String),
    /// 200 with a `text/html` body, as a captive portal or misrouted proxy would answer
    Html(String),
}

#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

struct MockState {
    behavior: MockBehavior,
    received: Mutex<Vec<ReceivedRequest>>,
}

pub struct MockUpstream {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: ServerHandle,
}

impl MockUpstream {
    pub async fn start(behavior: MockBehavior) -> Self {
        let state = Arc::new(MockState {
            behavior,
            received: Mutex::new(Vec::new()),
        });

        let app_state = web::Data::from(state.clone());
        let server = HttpServer::new(move || {
            App::new()
                .app_data(app_state.clone())
                .app_data(web::JsonConfig::default().limit(32 * 1024 * 1024))
                .route("/v1/chat/completions", web::post().to(chat_completions))
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        let server = server.run();
        let handle = server.handle();
        actix_web::rt::spawn(server);

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/v1/chat/completions", self.addr)
    }

    pub fn received(&self) -> Vec<ReceivedRequest> {
        self.state.received.lock().unwrap().clone()
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "model": "gpt-4o",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

async fn chat_completions(
    req: HttpRequest,
    body: web::Json<Value>,
    state: web::Data<MockState>,
) -> HttpResponse {
    let authorization = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.received.lock().unwrap().push(ReceivedRequest {
        authorization,
        body: body.into_inner(),
    });

    match &state.behavior {
        MockBehavior::Content(content) => HttpResponse::Ok().json(completion_body(content)),
        MockBehavior::Body(body) => HttpResponse::Ok().json(body),
        MockBehavior::Status(status, body) => {
            HttpResponse::build(StatusCode::from_u16(*status).unwrap()).json(body)
        }
        MockBehavior::Delayed(delay, content) => {
            actix_web::rt::time::sleep(*delay).await;
            HttpResponse::Ok().json(completion_body(content))
        }
        MockBehavior::Html(page) => HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(page.clone()),
    }
}

#![allow(dead_code)]

pub mod mock_upstream;

use actix_web::web;
use tutor_relay_rs::server::AppState;
use tutor_relay_rs::RelayConfig;

pub fn relay_config(upstream_url: &str) -> RelayConfig {
    RelayConfig {
        api_key: "sk-test-key".to_string(),
        upstream_url: upstream_url.to_string(),
        request_timeout_secs: 5,
        ..Default::default()
    }
}

pub fn app_state(config: &RelayConfig) -> web::Data<AppState> {
    web::Data::new(AppState::new(config).unwrap())
}

/// URL of a local port that nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/v1/chat/completions", port)
}

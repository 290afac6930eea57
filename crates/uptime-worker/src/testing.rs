use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::{Router, http::StatusCode};

use uptime_types::{Check, CheckState, HttpMethod, Protocol, ids};

use crate::error::TransportError;
use crate::notify::Notifier;

/// Serve `app` on an ephemeral local port.
pub async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Answers every request with `status`.
pub fn status_router(status: u16) -> Router {
    Router::new().fallback(move || async move { StatusCode::from_u16(status).unwrap() })
}

/// Answers 200 after `delay`.
pub fn slow_router(delay: Duration) -> Router {
    Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        StatusCode::OK
    })
}

/// A never-probed http check against a local server, accepting only 200.
pub fn check_for(addr: SocketAddr, path: &str, timeout_seconds: u64) -> Check {
    Check {
        id: ids::random_id(),
        user_phone: "5551234567".into(),
        protocol: Protocol::Http,
        url: format!("{addr}{path}"),
        method: HttpMethod::Get,
        success_codes: vec![200],
        timeout_seconds,
        state: CheckState::Down,
        last_checked: None,
    }
}

/// Records every alert; optionally fails each delivery.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, phone: &str, message: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        if self.fail {
            Err(TransportError::Status { status: 503 })
        } else {
            Ok(())
        }
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use activity_store::config::Config;
use activity_store::db::{MemoryDb, Store};
use activity_store::routes::create_router;
use activity_store::AppState;
use axum::{
    body::Bytes,
    http::{Method, StatusCode, Uri},
    response::IntoResponse,
    Router,
};
use std::sync::{Arc, Mutex};

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIREBASE_DATABASE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIREBASE_DATABASE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test app backed by an in-memory store.
/// Returns the router, the shared state, and the store for inspection.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>, MemoryDb) {
    let db = MemoryDb::new();
    let store: Arc<dyn Store> = Arc::new(db.clone());
    let state = Arc::new(
        AppState::new(Config::test_default(), store).expect("collection paths are valid"),
    );
    (create_router(state.clone()), state, db)
}

/// One request received by the mock database server.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Received {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub body: String,
}

/// Events served by the mock for any streaming GET.
#[allow(dead_code)]
pub const MOCK_STREAM: &str = concat!(
    "event: put\n",
    "data: {\"path\":\"/\",\"data\":{\"a1\":{\"name\":\"run\"}}}\n",
    "\n",
    "event: keep-alive\n",
    "data: null\n",
    "\n",
    "event: patch\n",
    "data: {\"path\":\"/a1\",\"data\":{\"name\":\"walk\"}}\n",
    "\n",
    "event: cancel\n",
    "data: null\n",
    "\n",
    "event: put\n",
    "data: {\"path\":\"/\",\"data\":null}\n",
    "\n",
);

/// Start a mock realtime database REST server on a random local port.
///
/// Paths under `/forbidden` answer 401 the way the database does when
/// security rules reject a request.
#[allow(dead_code)]
pub async fn start_mock_database() -> (String, Arc<Mutex<Vec<Received>>>) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    let app = Router::new().fallback(move |method: Method, uri: Uri, body: Bytes| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(Received {
                method: method.clone(),
                path: uri.path().to_string(),
                query: uri.query().unwrap_or("").to_string(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });

            if uri.path().starts_with("/forbidden") {
                return (
                    StatusCode::UNAUTHORIZED,
                    [("content-type", "application/json")],
                    "{\"error\":\"Permission denied\"}".to_string(),
                )
                    .into_response();
            }

            match method {
                Method::POST => (
                    StatusCode::OK,
                    [("content-type", "application/json")],
                    "{\"name\":\"-NmockKey0000000000\"}".to_string(),
                )
                    .into_response(),
                Method::PUT => StatusCode::NO_CONTENT.into_response(),
                Method::DELETE => (
                    StatusCode::OK,
                    [("content-type", "application/json")],
                    "null".to_string(),
                )
                    .into_response(),
                Method::GET => (
                    StatusCode::OK,
                    [("content-type", "text/event-stream")],
                    MOCK_STREAM.to_string(),
                )
                    .into_response(),
                _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
            }
        }
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock server");
    let addr = listener.local_addr().expect("mock server address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (format!("127.0.0.1:{}", addr.port()), received)
}

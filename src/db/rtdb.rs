// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime database client over the REST API.
//!
//! Every location is addressed as `{base_url}/{path}.json`:
//! - `POST` appends a child with a server-generated key
//! - `PUT` replaces a value
//! - `DELETE` removes a value
//! - `GET` with `Accept: text/event-stream` streams changes

use crate::db::sse::{to_change_event, SseParser};
use crate::db::{ChangeEvent, DbPath, EventStream, Store, StoreError};
use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;

/// Environment variable pointing at a local database emulator (`host:port`).
pub const EMULATOR_HOST_ENV: &str = "FIREBASE_DATABASE_EMULATOR_HOST";

/// Realtime database REST client.
#[derive(Clone)]
pub struct RealtimeDb {
    http: reqwest::Client,
    base_url: String,
    auth: Option<String>,
    namespace: Option<String>,
}

/// Body returned by `POST`.
#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

/// Body returned with error statuses.
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl RealtimeDb {
    /// Create a client for `database_url`.
    ///
    /// For local development with the emulator, set FIREBASE_DATABASE_EMULATOR_HOST;
    /// `database_url` and `auth` are then ignored and `namespace` selects the
    /// emulated database.
    pub fn new(database_url: &str, auth: Option<String>, namespace: &str) -> Self {
        if let Ok(host) = std::env::var(EMULATOR_HOST_ENV) {
            return Self::emulator(&host, namespace);
        }

        tracing::info!(url = database_url, "Using realtime database");

        Self {
            http: reqwest::Client::new(),
            base_url: database_url.trim_end_matches('/').to_string(),
            auth,
            namespace: None,
        }
    }

    /// Create an unauthenticated client for the emulator at `host`.
    pub fn emulator(host: &str, namespace: &str) -> Self {
        tracing::info!(
            host,
            namespace,
            "Using realtime database emulator (unauthenticated)"
        );

        let base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", host.trim_end_matches('/'))
        };

        Self {
            http: reqwest::Client::new(),
            base_url,
            auth: None,
            namespace: Some(namespace.to_string()),
        }
    }

    /// REST URL for a location.
    pub fn url(&self, path: &DbPath) -> String {
        let encoded: Vec<String> = path
            .segments()
            .iter()
            .map(|s| urlencoding::encode(s).into_owned())
            .collect();
        format!("{}/{}.json", self.base_url, encoded.join("/"))
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(auth) = &self.auth {
            query.push(("auth", auth.clone()));
        }
        if let Some(ns) = &self.namespace {
            query.push(("ns", ns.clone()));
        }
        query
    }

    /// Map non-success statuses to errors, keeping the server's message.
    async fn check_response(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(StoreError::PermissionDenied(message));
        }
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn push_value(&self, path: &DbPath, value: Value) -> Result<String, StoreError> {
        let response = self
            .http
            .post(self.url(path))
            .query(&self.query())
            .json(&value)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let body: PushResponse = self
            .check_response(response)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        tracing::debug!(path = %path, key = %body.name, "push");
        Ok(body.name)
    }

    async fn set_value(&self, path: &DbPath, value: Value) -> Result<(), StoreError> {
        let response = self
            .http
            .put(self.url(path))
            .query(&self.query())
            .query(&[("print", "silent")])
            .json(&value)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        self.check_response(response).await?;
        tracing::debug!(path = %path, "set");
        Ok(())
    }

    async fn remove_value(&self, path: &DbPath) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.url(path))
            .query(&self.query())
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        self.check_response(response).await?;
        tracing::debug!(path = %path, "remove");
        Ok(())
    }

    async fn open_stream(&self, path: &DbPath) -> Result<EventStream, StoreError> {
        let response = self
            .http
            .get(self.url(path))
            .query(&self.query())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let response = self.check_response(response).await?;
        tracing::debug!(path = %path, "subscribed");

        let state = StreamState {
            bytes: Box::pin(response.bytes_stream()),
            parser: SseParser::new(),
            pending: VecDeque::new(),
            done: false,
            path: path.clone(),
        };

        Ok(stream::unfold(state, next_event).boxed())
    }
}

struct StreamState<S> {
    bytes: std::pin::Pin<Box<S>>,
    parser: SseParser,
    pending: VecDeque<Result<ChangeEvent, StoreError>>,
    done: bool,
    path: DbPath,
}

/// Yield the next change, reading more bytes as needed. The stream ends
/// after a transport error, a terminal event, or the server closing it.
async fn next_event<S, B>(
    mut state: StreamState<S>,
) -> Option<(Result<ChangeEvent, StoreError>, StreamState<S>)>
where
    S: futures_util::Stream<Item = reqwest::Result<B>>,
    B: AsRef<[u8]>,
{
    loop {
        if let Some(item) = state.pending.pop_front() {
            if matches!(&item, Ok(event) if event.is_terminal()) {
                tracing::warn!(path = %state.path, event = ?item, "Subscription ended by server");
                state.done = true;
                state.pending.clear();
            }
            return Some((item, state));
        }
        if state.done {
            return None;
        }

        match state.bytes.next().await {
            Some(Ok(chunk)) => {
                for event in state.parser.feed(chunk.as_ref()) {
                    match to_change_event(&event) {
                        Ok(Some(change)) => state.pending.push_back(Ok(change)),
                        Ok(None) => {}
                        Err(e) => state.pending.push_back(Err(e)),
                    }
                }
            }
            Some(Err(e)) => {
                tracing::warn!(path = %state.path, error = %e, "Subscription stream failed");
                state.done = true;
                return Some((Err(StoreError::Transport(e.to_string())), state));
            }
            None => {
                tracing::debug!(path = %state.path, "Subscription stream closed");
                return None;
            }
        }
    }
}

impl Store for RealtimeDb {
    fn push<'a>(
        &'a self,
        path: &'a DbPath,
        value: Value,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        self.push_value(path, value).boxed()
    }

    fn set<'a>(&'a self, path: &'a DbPath, value: Value) -> BoxFuture<'a, Result<(), StoreError>> {
        self.set_value(path, value).boxed()
    }

    fn remove<'a>(&'a self, path: &'a DbPath) -> BoxFuture<'a, Result<(), StoreError>> {
        self.remove_value(path).boxed()
    }

    fn subscribe<'a>(
        &'a self,
        path: &'a DbPath,
    ) -> BoxFuture<'a, Result<EventStream, StoreError>> {
        self.open_stream(path).boxed()
    }
}

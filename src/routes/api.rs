// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for the record collections.
//!
//! Each collection `{name}` gets the same four routes:
//! - `POST   /api/{name}`         create, responds `201 {"id": ...}`
//! - `PUT    /api/{name}/{id}`    replace the record
//! - `DELETE /api/{name}/{id}`    remove the record
//! - `GET    /api/stream/{name}`  Server-Sent Events of changes
//!
//! Streams live outside `/api/{name}` so every key, `stream` included, can
//! be addressed as a record id.

use crate::db::{ChangeEvent, CollectionAdapter, DbPath, StoreError};
use crate::error::{AppError, Result};
use crate::models::{Activity, ActivityGroup, Record};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A collection served over HTTP.
pub trait Collection: Send + Sync + 'static {
    type Record: Record;

    fn adapter(state: &AppState) -> &CollectionAdapter<Self::Record>;
}

pub struct Activities;

impl Collection for Activities {
    type Record = Activity;

    fn adapter(state: &AppState) -> &CollectionAdapter<Activity> {
        &state.activities
    }
}

pub struct ActivityGroups;

impl Collection for ActivityGroups {
    type Record = ActivityGroup;

    fn adapter(state: &AppState) -> &CollectionAdapter<ActivityGroup> {
        &state.activity_groups
    }
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(collection_routes::<Activities>("activities"))
        .merge(collection_routes::<ActivityGroups>("activity-groups"))
}

fn collection_routes<C: Collection>(name: &str) -> Router<Arc<AppState>> {
    let base = format!("/api/{}", name);
    Router::new()
        .route(&base, post(create_record::<C>))
        .route(&format!("/api/stream/{}", name), get(stream_records::<C>))
        .route(
            &format!("{}/{{id}}", base),
            put(update_record::<C>).delete(delete_record::<C>),
        )
}

/// Response for a created record.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreatedResponse {
    pub id: String,
}

async fn create_record<C: Collection>(
    State(state): State<Arc<AppState>>,
    Json(record): Json<C::Record>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    let adapter = C::adapter(&state);
    let id = adapter.create(&record).await?;

    tracing::info!(collection = %adapter.path(), id = %id, "Record created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Replace a record. The path id wins; a body carrying a different id is
/// rejected rather than silently moved.
async fn update_record<C: Collection>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(record): Json<C::Record>,
) -> Result<StatusCode> {
    if let Some(body_id) = record.id() {
        if body_id != id {
            return Err(AppError::BadRequest(format!(
                "Body id '{}' does not match path id '{}'",
                body_id, id
            )));
        }
    }

    let adapter = C::adapter(&state);
    adapter.update(&record.with_id(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_record<C: Collection>(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let adapter = C::adapter(&state);
    adapter.delete_id(Some(&id)).await?;

    tracing::info!(collection = %adapter.path(), id = %id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn stream_records<C: Collection>(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let reference = C::adapter(&state).listen();
    let events = reference.subscribe().await?;

    tracing::info!(collection = %reference.path(), "Stream opened");
    let stream = events.map(|item| Ok::<_, Infallible>(to_sse_event(item)));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Render a change the way the realtime database streams it.
fn to_sse_event(item: std::result::Result<ChangeEvent, StoreError>) -> Event {
    match item {
        Ok(ChangeEvent::Put { path, data }) => Event::default()
            .event("put")
            .data(serde_json::json!({ "path": wire_path(&path), "data": data }).to_string()),
        Ok(ChangeEvent::Patch { path, data }) => Event::default()
            .event("patch")
            .data(serde_json::json!({ "path": wire_path(&path), "data": data }).to_string()),
        Ok(ChangeEvent::Cancel { reason }) => Event::default()
            .event("cancel")
            .data(serde_json::json!(reason).to_string()),
        Ok(ChangeEvent::AuthRevoked) => Event::default().event("auth_revoked").data("null"),
        Err(err) => {
            tracing::warn!(error = %err, "Stream error");
            Event::default()
                .event("error")
                .data(serde_json::json!(err.to_string()).to_string())
        }
    }
}

fn wire_path(path: &DbPath) -> String {
    if path.is_root() {
        "/".to_string()
    } else {
        format!("/{}", path)
    }
}

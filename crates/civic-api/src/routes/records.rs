//! # Record Collections
//!
//! The same four endpoints for each entity kind:
//!
//! - `POST {base}`: validate, encrypt, store; 201 with the decrypted view
//! - `GET {base}`: every record through `from_storage`, optional `?status=`
//! - `GET {base}/analytics`: counts over public fields, no decryption
//! - `GET {base}/:id`: one record or 404
//!
//! `base` is `/v1/citizens` or `/v1/service-requests`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use civic_fields::codec::as_record;
use civic_fields::{analytics, AnalyticsReport, EntityKind, Record};
use civic_hsm::HsmTransport;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{extract_json, extract_query, parse_id};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Match on the public `status` field.
    pub status: Option<String>,
}

pub fn collection_path(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Citizen => "/v1/citizens",
        EntityKind::ServiceRequest => "/v1/service-requests",
    }
}

pub fn router<T: HsmTransport + 'static>(kind: EntityKind) -> Router<AppState<T>> {
    let base = collection_path(kind);
    Router::new()
        .route(
            base,
            get(
                move |state: State<AppState<T>>,
                      query: Result<Query<ListQuery>, QueryRejection>| {
                    list_records(kind, state, query)
                },
            )
            .post(
                move |state: State<AppState<T>>, body: Result<Json<Value>, JsonRejection>| {
                    create_record(kind, state, body)
                },
            ),
        )
        .route(
            &format!("{base}/analytics"),
            get(move |state: State<AppState<T>>| record_analytics(kind, state)),
        )
        .route(
            &format!("{base}/:id"),
            get(move |state: State<AppState<T>>, id: Path<String>| get_record(kind, state, id)),
        )
}

/// Server-owned fields: id and timestamps are always assigned here, and
/// the period field defaults to the creation time.
fn stamp(kind: EntityKind, entity: &mut Record, id: Uuid, now: DateTime<Utc>) {
    let ts = Value::String(now.to_rfc3339());
    entity.insert("id".into(), Value::String(id.to_string()));
    entity.insert("createdAt".into(), ts.clone());
    entity.insert("updatedAt".into(), ts.clone());
    let period = entity.entry(kind.period_field()).or_insert(Value::Null);
    if period.is_null() {
        *period = ts;
    }
}

async fn create_record<T: HsmTransport + 'static>(
    kind: EntityKind,
    State(state): State<AppState<T>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Record>), AppError> {
    let body = extract_json(body)?;
    let mut entity = as_record(&body)?.clone();

    let id = Uuid::new_v4();
    let now = Utc::now();
    stamp(kind, &mut entity, id, now);

    let stored = state.encryption.to_storage(kind, &entity).await?;
    state.records.insert(kind, id, stored, now).await?;
    tracing::info!(entity = %kind, %id, "record created");

    Ok((StatusCode::CREATED, Json(state.encryption.written_view(kind, &entity))))
}

fn status_matches(record: &Record, wanted: Option<&str>) -> bool {
    match wanted {
        None => true,
        Some(status) => record.get("status").and_then(Value::as_str) == Some(status),
    }
}

async fn list_records<T: HsmTransport + 'static>(
    kind: EntityKind,
    State(state): State<AppState<T>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Record>>, AppError> {
    let query = extract_query(query)?;
    let rows = state.records.list(kind).await?;

    let mut views = Vec::with_capacity(rows.len());
    for row in rows.iter().filter(|r| status_matches(r, query.status.as_deref())) {
        views.push(state.encryption.from_storage(kind, row).await);
    }
    Ok(Json(views))
}

async fn get_record<T: HsmTransport + 'static>(
    kind: EntityKind,
    State(state): State<AppState<T>>,
    Path(id): Path<String>,
) -> Result<Json<Record>, AppError> {
    let id = parse_id(&id)?;
    let stored = state
        .records
        .get(kind, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{kind} {id} not found")))?;
    Ok(Json(state.encryption.from_storage(kind, &stored).await))
}

async fn record_analytics<T: HsmTransport + 'static>(
    kind: EntityKind,
    State(state): State<AppState<T>>,
) -> Result<Json<AnalyticsReport>, AppError> {
    let rows = state.records.list(kind).await?;
    Ok(Json(analytics(kind, &rows)))
}

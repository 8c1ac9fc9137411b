use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::contact::{timestamp_id, Contact, NewContact};
use crate::store::Document;

use super::error::{ApiError, ApiResult};
use super::ServerState;

pub const DELETED_MESSAGE: &str = "Contacto eliminado";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub async fn list_handler(State(state): State<Arc<ServerState>>) -> Json<Vec<Contact>> {
    Json(state.store.load().await)
}

pub async fn create_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<NewContact>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    let mut document = state.store.load_document().await;

    let id = timestamp_id(|candidate| document.has_id(candidate));
    let contact = payload.into_contact(id);
    document.push(contact.clone());
    persist(&state, &document).await?;

    info!(id, "contact created");
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn toggle_favorite_handler(
    State(state): State<Arc<ServerState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<Contact>> {
    let id = parse_id(&raw_id).ok_or(ApiError::NotFound)?;
    let mut document = state.store.load_document().await;

    let contact = document
        .contacts_mut()
        .find(|c| c.id == id)
        .ok_or(ApiError::NotFound)?;
    contact.favorite = !contact.favorite;
    let updated = contact.clone();
    persist(&state, &document).await?;

    info!(id, favorite = updated.favorite, "favorite toggled");
    Ok(Json(updated))
}

pub async fn delete_handler(
    State(state): State<Arc<ServerState>>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<MessageBody>> {
    let mut document = state.store.load_document().await;

    if let Some(id) = parse_id(&raw_id) {
        let removed = document.retain(|c| c.id != id);
        info!(id, removed, "contact deleted");
    }
    persist(&state, &document).await?;

    Ok(Json(MessageBody::new(DELETED_MESSAGE)))
}

async fn persist(state: &ServerState, document: &Document) -> ApiResult<()> {
    state
        .store
        .save(document)
        .await
        .map_err(|err| ApiError::Storage(format!("{err:#}")))
}

/// Path ids arrive as text; anything that is not a whole number matches
/// no record.
fn parse_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(id) = trimmed.parse::<i64>() {
        return Some(id);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && value.fract() == 0.0)
        .map(|value| value as i64)
}

//! Dialogue endpoints: run a turn, reset and read the conversation.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::history::Role;
use crate::ollama::ChatModel;
use crate::service::TurnState;

use super::AppState;

/// One message or several; only the last is recorded in history
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatInput {
    Single(String),
    Many(Vec<String>),
}

impl ChatInput {
    pub fn into_messages(self) -> Vec<String> {
        match self {
            ChatInput::Single(message) => vec![message],
            ChatInput::Many(messages) => messages,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatTurnRequest {
    pub input: ChatInput,
}

pub async fn chat_handler<M: ChatModel>(
    State(state): State<Arc<AppState<M>>>,
    Json(request): Json<ChatTurnRequest>,
) -> Result<Json<TurnState>, ServiceError> {
    let turn = state.service.chat(request.input.into_messages()).await?;
    Ok(Json(turn))
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn reset_handler<M: ChatModel>(State(state): State<Arc<AppState<M>>>) -> Json<MessageResponse> {
    state.service.reset_history().await;
    Json(MessageResponse {
        message: "Chat history reset successfully".to_string(),
    })
}

#[derive(Serialize)]
pub struct HistoryResponse {
    /// `[role, content]` pairs in conversation order
    pub history: Vec<(Role, String)>,
}

pub async fn history_handler<M: ChatModel>(State(state): State<Arc<AppState<M>>>) -> Json<HistoryResponse> {
    let history = state
        .service
        .history()
        .into_iter()
        .map(|entry| (entry.role, entry.content))
        .collect();
    Json(HistoryResponse { history })
}

//! User profile endpoints.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::ollama::ChatModel;

use super::AppState;
use super::chat::MessageResponse;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub profile_name: String,
    pub content: String,
}

pub async fn get_profile_handler<M: ChatModel>(
    State(state): State<Arc<AppState<M>>>,
) -> Json<ProfileResponse> {
    let profiles = state.service.profiles();
    Json(ProfileResponse {
        profile_name: profiles.current_name().to_string(),
        content: profiles.load(),
    })
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub content: String,
}

pub async fn update_profile_handler<M: ChatModel>(
    State(state): State<Arc<AppState<M>>>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<MessageResponse>, ServiceError> {
    let profiles = state.service.profiles();
    profiles.save(&request.content)?;

    Ok(Json(MessageResponse {
        message: format!("User profile {} updated successfully", profiles.current_name()),
    }))
}

#[derive(Serialize)]
pub struct ProfileListResponse {
    pub profiles: Vec<String>,
    pub current: String,
}

pub async fn list_profiles_handler<M: ChatModel>(
    State(state): State<Arc<AppState<M>>>,
) -> Result<Json<ProfileListResponse>, ServiceError> {
    let profiles = state.service.profiles();
    Ok(Json(ProfileListResponse {
        profiles: profiles.list()?,
        current: profiles.current_name().to_string(),
    }))
}

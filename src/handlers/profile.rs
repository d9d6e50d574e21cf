//! Own profile

use axum::extract::State;
use axum::Json;
use crate::middleware::AuthContext;
use crate::models::user::{UpdateProfileRequest, User};
use crate::state::AppState;
use crate::utils::errors::Result;

pub async fn handle_get_profile(context: AuthContext) -> Json<User> {
    Json(context.user)
}

pub async fn handle_update_profile(
    State(state): State<AppState>,
    context: AuthContext,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    Ok(Json(state.services.user_service.update_profile(&context.user, request).await?))
}

//! Cart route handlers.
//!
//! Clients hold product ids only as opaque tokens. Every response carries
//! freshly encoded tokens; submitted tokens are never echoed back.

use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use tracing::instrument;

use cartseal_core::{CartLineRequest, UserId};

use crate::error::{AppError, Result, set_sentry_user};
use crate::services::cart::CartSnapshot;
use crate::state::AppState;

/// Validate and re-present the cart of an anonymous visitor.
#[instrument(skip(state, body))]
pub async fn preview(
    State(state): State<AppState>,
    body: std::result::Result<Json<Vec<CartLineRequest>>, JsonRejection>,
) -> Result<Json<CartSnapshot>> {
    let Json(lines) = body.map_err(bad_body)?;
    let snapshot = state.carts().preview(&lines)?;
    Ok(Json(snapshot))
}

/// Return the stored cart for a user.
#[instrument(skip(state))]
pub async fn load(
    State(state): State<AppState>,
    user_id: std::result::Result<Path<i32>, PathRejection>,
) -> Result<Json<CartSnapshot>> {
    let user_id = parse_user_id(user_id)?;
    set_sentry_user(&user_id);

    let snapshot = state.carts().load(user_id).await?;
    Ok(Json(snapshot))
}

/// Merge the client's cart into the user's stored cart.
#[instrument(skip(state, body))]
pub async fn sync(
    State(state): State<AppState>,
    user_id: std::result::Result<Path<i32>, PathRejection>,
    body: std::result::Result<Json<Vec<CartLineRequest>>, JsonRejection>,
) -> Result<Json<CartSnapshot>> {
    let user_id = parse_user_id(user_id)?;
    set_sentry_user(&user_id);

    let Json(lines) = body.map_err(bad_body)?;
    let snapshot = state.carts().sync(user_id, &lines).await?;
    Ok(Json(snapshot))
}

fn parse_user_id(path: std::result::Result<Path<i32>, PathRejection>) -> Result<UserId> {
    let Path(raw) = path.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    if raw <= 0 {
        return Err(AppError::BadRequest(format!("invalid user id {raw}")));
    }
    Ok(UserId::new(raw))
}

/// A body that is not a JSON array is a 400; lines of the wrong shape are
/// judged one by one by the reconciler.
fn bad_body(rejection: JsonRejection) -> AppError {
    AppError::BadRequest(rejection.body_text())
}

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

/// Holds a worker permit for the whole pipeline request; a full pool turns
/// the request away with 429 before the body is read.
pub async fn admission_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = request.uri().path().to_string();
    let _permit = state.pool.try_admit()?;

    let response = next.run(request).await;

    debug!(
        path = %path,
        available_permits = state.pool.metrics().available_permits + 1,
        "Request completed, permit released"
    );
    Ok(response)
}

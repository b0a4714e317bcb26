//! Route definitions for batch jobs.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batches;
use crate::state::AppState;

/// Routes merged into `/api/v1`.
///
/// ```text
/// POST   /upload                    -> upload
/// GET    /status/{request_id}       -> status
/// GET    /download/{request_id}     -> download
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(batches::upload))
        .route("/status/{request_id}", get(batches::status))
        .route("/download/{request_id}", get(batches::download))
}

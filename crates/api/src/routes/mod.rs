pub mod batches;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /upload                        submit a product table (POST, multipart)
/// /status/{request_id}           job status
/// /download/{request_id}         output table of a completed job
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(batches::router())
}

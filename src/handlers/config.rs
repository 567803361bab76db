//! Configuration display endpoint handler.
//!
//! Serves the effective configuration as JSON. Credentials are only ever
//! referenced by file path, so nothing secret is held in it.

use axum::{extract::State, response::IntoResponse, Json};
use tracing::{debug, instrument};

use crate::state::SharedState;

/// Handler for the /config endpoint.
#[instrument(skip(state))]
pub async fn config_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /config request");
    Json(state.config.effective())
}

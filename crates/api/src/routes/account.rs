//! Route definitions for the `/account` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::devices;
use crate::state::AppState;

/// Routes mounted at `/account`. All require authentication.
///
/// ```text
/// GET    /devices                -> list_devices
/// DELETE /devices/{id}           -> revoke_device
/// POST   /devices/revoke-others  -> revoke_other_devices
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(devices::list_devices))
        .route("/devices/{id}", delete(devices::revoke_device))
        .route("/devices/revoke-others", post(devices::revoke_other_devices))
}

//! Shared response envelope types for API handlers.
//!
//! Collection responses use a `{ "data": ... }` envelope. Auth responses are
//! returned bare so native clients can read tokens directly.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

//! Shared query parameter types for API handlers.

use inkstone_core::types::DbId;
use serde::Deserialize;

/// Page-based pagination parameters (`?page=&per_page=`).
///
/// Values are normalized by the service that serves the listing.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Query parameters for `GET /works`.
#[derive(Debug, Default, Deserialize)]
pub struct WorkListParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Defaults to `approved`; `all` disables the filter.
    pub status: Option<String>,
    pub style: Option<String>,
    pub author_id: Option<DbId>,
    pub search: Option<String>,
}

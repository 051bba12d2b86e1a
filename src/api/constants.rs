//! API Constants and Configuration for the Luzmo REST API

/// Luzmo API version sent in every request body
pub const API_VERSION: &str = "0.1.0";

/// Default base URL (US region)
pub const DEFAULT_BASE_URL: &str = "https://api.us.cumul.io/0.1.0/";

/// Resource endpoints, appended to the base URL
pub mod resources {
    pub const SECURABLE: &str = "securable";
    pub const COLUMN: &str = "column";
    pub const HIERARCHY: &str = "hierarchy";
    pub const DATAPROVIDER: &str = "dataprovider";
    pub const ACCELERATION: &str = "acceleration";
    pub const COLLECTION: &str = "collection";
}

/// Request actions understood by every resource
pub mod actions {
    pub const GET: &str = "get";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const ASSOCIATE: &str = "associate";
}

/// Securable types
pub mod securable_types {
    pub const DATASET: &str = "dataset";
    pub const DASHBOARD: &str = "dashboard";
}

/// Column type marking a drill-down hierarchy column
pub const HIERARCHY_COLUMN_TYPE: &str = "hierarchy";

/// Language key used for localized names
pub const NAME_LOCALE: &str = "en";

/// HTTP status codes the service uses to ask for backoff
pub mod backoff_status {
    pub const RATE_LIMITED: u16 = 429;
    pub const GATEWAY_TIMEOUT: u16 = 504;
}

pub mod headers {
    pub const CONTENT_TYPE_JSON: &str = "application/json";
    pub const X_CORRELATION_ID: &str = "x-correlation-id";
}

/// Build a full resource URL, tolerating a base URL with or without a trailing slash
pub fn resource_endpoint(base_url: &str, resource: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), resource)
}

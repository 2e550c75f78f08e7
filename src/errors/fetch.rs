//! Step-plan retrieval errors.

/// Errors that can occur while fetching a step plan from the definitions service
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Definitions request to {url} failed: {reason}")]
    RequestFailed { url: String, reason: String },

    #[error("Definitions service returned HTTP {status} for asset {asset_id}")]
    UnexpectedStatus { asset_id: String, status: u16 },

    #[error("Failed to decode step plan for asset {asset_id}: {reason}")]
    DecodeFailed { asset_id: String, reason: String },

    #[error("Unsupported step plan version {version}, expected {expected}")]
    UnsupportedVersion { version: u32, expected: u32 },

    #[error("Step plan mismatch for asset {asset_id}: {field} expected {expected}, got {actual}")]
    PlanMismatch {
        asset_id: String,
        field: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Invalid definitions URL: {reason}")]
    InvalidUrl { reason: String },
}

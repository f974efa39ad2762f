//! API constants

/// Versioned prefix of every API route
pub const API_PREFIX: &str = "/api/v0";

/// Files accepted in one batch upload
pub const MAX_BATCH_FILES: usize = 20;

//! Storage key constants.

/// Storage keys used by the session client
pub struct StorageKeys;

impl StorageKeys {
    /// Refresh credential (the only persisted piece of the session)
    pub const REFRESH_TOKEN: &'static str = "fitmatch_refresh_token";
}

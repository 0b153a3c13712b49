use super::request_context::RequestHeaders;

/// Where the pre-authenticated principal id comes from.
pub trait TrustedIdentity: Send + Sync {
    /// The asserted principal id, or `None` when nothing usable was asserted.
    fn asserted_principal(&self, request: &RequestHeaders) -> Option<String>;
}

/// Reads the principal id from one header set by the fronting proxy.
#[derive(Debug, Clone)]
pub struct RemoteUserHeader {
    pub header: String,
}

impl RemoteUserHeader {
    pub fn new(header: impl Into<String>) -> Self { Self { header: header.into() } }
}

impl TrustedIdentity for RemoteUserHeader {
    fn asserted_principal(&self, request: &RequestHeaders) -> Option<String> {
        request
            .get(&self.header)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

/// Lower-case the id so every header casing maps to one local account.
pub fn normalize_user_id(user_id: &str) -> String { user_id.trim().to_lowercase() }

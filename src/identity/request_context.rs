use std::borrow::Cow;

/// Headers of one incoming request, in arrival order. Lookups ignore case.
/// Repeated headers are kept; `get` returns the first occurrence.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    headers: Vec<(String, String)>,
    pub request_id: Option<String>,
}

impl RequestHeaders {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.trim();
        self.headers
            .iter()
            .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Header bytes as text. Proxies forward UTF-8 attribute values as raw
/// bytes; anything that is not valid UTF-8 is read as ISO-8859-1.
pub fn decode_header_value(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

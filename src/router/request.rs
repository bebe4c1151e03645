//! Request descriptor the router matches against.

use std::collections::HashMap;

use super::condition::ConditionKey;

/// The fields of an inbound request that route conditions can test.
///
/// Methods are stored lower-case. Fields a request does not carry read as the
/// empty string, so a condition on a missing field only matches patterns that
/// accept `""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    path: String,
    method: String,
    protocol: String,
    host: String,
    fields: HashMap<String, String>,
}

impl Request {
    /// A `GET` over `http://` for `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: "get".to_string(),
            protocol: "http://".to_string(),
            host: String::new(),
            fields: HashMap::new(),
        }
    }

    #[must_use]
    pub fn method(mut self, method: impl AsRef<str>) -> Self {
        self.method = method.as_ref().to_lowercase();
        self
    }

    #[must_use]
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set an extra named field (`user_agent`, `referer`, ...).
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set a boolean field; it reads as `"true"` / `"false"`.
    #[must_use]
    pub fn flag(self, name: impl Into<String>, value: bool) -> Self {
        self.field(name, value.to_string())
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn method_str(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn protocol_str(&self) -> &str {
        &self.protocol
    }

    #[must_use]
    pub fn host_str(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// True when the named field holds `"true"`.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.get(name) == Some("true")
    }

    /// The value a condition on `key` is tested against.
    #[must_use]
    pub fn value_for(&self, key: &ConditionKey) -> &str {
        match key {
            ConditionKey::Path => &self.path,
            ConditionKey::Method => &self.method,
            ConditionKey::Protocol => &self.protocol,
            ConditionKey::Host => &self.host,
            ConditionKey::Custom(name) => self.get(name).unwrap_or_default(),
        }
    }
}

impl<B> From<&http::Request<B>> for Request {
    fn from(req: &http::Request<B>) -> Self {
        let uri = req.uri();
        let protocol = match uri.scheme_str() {
            Some("https") => "https://",
            _ => "http://",
        };
        let host = req
            .headers()
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|a| a.as_str().to_string()))
            .unwrap_or_default();

        let mut request = Request::new(uri.path())
            .method(req.method().as_str())
            .protocol(protocol)
            .host(host);
        for (name, value) in req.headers() {
            if let Ok(value) = value.to_str() {
                let field = name.as_str().to_lowercase().replace('-', "_");
                request.fields.insert(field, value.to_string());
            }
        }
        let xhr = request
            .get("x_requested_with")
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));
        request.flag("xhr", xhr)
    }
}

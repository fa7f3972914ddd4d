//! Request template shared by every worker

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

/// The HTTP exchange every worker repeats
///
/// Built once by the caller before a run and shared read-only across workers.
/// The body is a [`Bytes`] so each send clones a reference count, not the
/// payload.
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    /// HTTP method
    pub method: Method,

    /// Target URL
    pub url: Url,

    /// Request headers
    pub headers: HeaderMap,

    /// Request body (may be empty)
    pub body: Bytes,

    /// Basic-auth credentials (username, password)
    pub basic_auth: Option<(String, String)>,

    /// Override for the `Host` header
    pub host: Option<String>,
}

impl RequestTemplate {
    /// Create a bodiless template
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            basic_auth: None,
            host: None,
        }
    }

    /// Shorthand for a GET template
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Set a header, replacing any previous value for the same name
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request body
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Set basic-auth credentials
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some((username.into(), password.into()));
        self
    }

    /// Override the `Host` header
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    #[test]
    fn test_template_builder() {
        let url = Url::parse("http://localhost:8080/health").unwrap();
        let template = RequestTemplate::new(Method::POST, url.clone())
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(r#"{"ping":true}"#)
            .with_basic_auth("user", "secret")
            .with_host("example.com");

        assert_eq!(template.method, Method::POST);
        assert_eq!(template.url, url);
        assert_eq!(template.headers[CONTENT_TYPE], "application/json");
        assert_eq!(template.body.len(), 13);
        assert_eq!(
            template.basic_auth,
            Some(("user".to_string(), "secret".to_string()))
        );
        assert_eq!(template.host.as_deref(), Some("example.com"));
    }

    #[test]
    fn test_clone_shares_body() {
        let url = Url::parse("http://localhost/").unwrap();
        let template = RequestTemplate::get(url).with_body(vec![0u8; 1024]);
        let copy = template.clone();
        assert_eq!(template.body.as_ptr(), copy.body.as_ptr());
    }
}

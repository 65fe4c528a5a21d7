use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What the application intends to do with a fetched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation. Falls back to the shell document offline.
    Document,
    Style,
    Script,
    Manifest,
    Image,
    Data,
    Other,
}

impl Destination {
    /// Guess the destination from a URL path's extension.
    pub fn infer(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let file = path.rsplit('/').next().unwrap_or_default();
        if file == "manifest.json" || file.ends_with(".webmanifest") {
            return Destination::Manifest;
        }
        match file.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
            None => Destination::Document,
            Some(ext) => match ext.as_str() {
                "html" | "htm" => Destination::Document,
                "css" => Destination::Style,
                "js" | "mjs" => Destination::Script,
                "json" => Destination::Data,
                "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "ico" => Destination::Image,
                _ => Destination::Other,
            },
        }
    }
}

/// An outbound resource request as seen by the interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path (and query) relative to the application origin, e.g. `/style.css`.
    pub url: String,
    pub destination: Destination,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>, destination: Destination) -> Self {
        Self {
            method,
            url: url.into(),
            destination,
        }
    }

    pub fn get(url: impl Into<String>, destination: Destination) -> Self {
        Self::new(Method::GET, url, destination)
    }

    /// GET whose destination is inferred from the URL.
    pub fn for_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let destination = Destination::infer(&url);
        Self::get(url, destination)
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::get(url, Destination::Document)
    }

    pub fn is_navigation(&self) -> bool {
        self.destination == Destination::Document
    }

    /// Only GET responses are stored or served from the cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::GET
    }

    /// Stable file-safe key for the bucket entry of this request.
    pub fn cache_key(&self) -> String {
        cache_key(self.method.as_str(), &self.url)
    }
}

pub(crate) fn cache_key(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b" ");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    /// Stored separately from the metadata in the bucket.
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_destination() {
        assert_eq!(Destination::infer("/"), Destination::Document);
        assert_eq!(Destination::infer("/index.html"), Destination::Document);
        assert_eq!(Destination::infer("/techniques/12"), Destination::Document);
        assert_eq!(Destination::infer("/style.css"), Destination::Style);
        assert_eq!(Destination::infer("/app.js?v=3"), Destination::Script);
        assert_eq!(Destination::infer("/manifest.json"), Destination::Manifest);
        assert_eq!(Destination::infer("/data/cases.json"), Destination::Data);
        assert_eq!(Destination::infer("/img/spine.PNG"), Destination::Image);
        assert_eq!(Destination::infer("/font.woff2"), Destination::Other);
    }

    #[test]
    fn test_cache_key_depends_on_method_and_url() {
        let get = Request::for_url("/app.js");
        let post = Request::new(Method::POST, "/app.js", Destination::Script);
        assert_eq!(get.cache_key().len(), 64);
        assert_eq!(get.cache_key(), Request::for_url("/app.js").cache_key());
        assert_ne!(get.cache_key(), post.cache_key());
        assert!(get.is_cacheable());
        assert!(!post.is_cacheable());
    }

    #[test]
    fn test_response_helpers() {
        let response = Response::new("/data/anatomy.json", 200, br#"[{"id":1}]"#.to_vec())
            .with_header("Content-Type", "application/json");
        assert!(response.ok());
        assert_eq!(response.header("content-type"), Some("application/json"));
        let items: Vec<serde_json::Value> = response.json().unwrap();
        assert_eq!(items.len(), 1);
        assert!(!Response::new("/x", 404, Vec::new()).ok());
    }
}

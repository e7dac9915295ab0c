//! The mutable outgoing request a pipeline run builds up.

use std::str::FromStr;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use url::Url;

use crate::InvokeError;

/// A request body together with the content type it implies.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl RequestBody {
    /// The `Content-Type` value this body should be sent with.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Json(_) => "application/json",
            Self::Text(_) => "text/plain; charset=utf-8",
            Self::Bytes(_) => "application/octet-stream",
        }
    }

    /// Encode the body into raw bytes for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Json(value) => serde_json::to_vec(value),
            Self::Text(text) => Ok(text.clone().into_bytes()),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }
}

/// The outgoing request representation.
///
/// Created by the pipeline's prepare phase and mutated by hooks (headers,
/// query pairs, body, URL) until the dispatch phase consumes it. Performs
/// no IO itself.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<RequestBody>,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    #[must_use]
    pub const fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: RequestBody) {
        self.body = Some(body);
    }

    /// Append a header, validating name and value.
    ///
    /// Appending keeps any header already present under the same name.
    pub fn append_header(&mut self, name: &str, value: &str) -> Result<(), InvokeError> {
        let name = HeaderName::from_str(name)
            .map_err(|e| InvokeError::Request(format!("invalid header name `{name}`: {e}")))?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            InvokeError::Request(format!("invalid header value for `{name}`: {e}"))
        })?;
        self.headers.append(name, value);
        Ok(())
    }

    /// Append a query pair to the URL, preserving pairs already present.
    pub fn append_query(&mut self, name: &str, value: &str) {
        self.url.query_pairs_mut().append_pair(name, value);
    }

    /// Decompose the request for the transport layer.
    #[must_use]
    pub fn into_parts(self) -> (Method, Url, HeaderMap, Option<RequestBody>) {
        (self.method, self.url, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiRequest, RequestBody};
    use http::Method;
    use url::Url;

    fn request() -> ApiRequest {
        ApiRequest::new(Method::GET, Url::parse("https://api.example.com/v1/users").unwrap())
    }

    #[test]
    fn append_header_validates_name_and_value() {
        let mut req = request();
        assert!(req.append_header("X-Api-Key", "secret").is_ok());
        assert!(req.append_header("bad name", "value").is_err());
        assert!(req.append_header("X-Bad-Value", "line\nbreak").is_err());
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn append_header_keeps_existing_values() {
        let mut req = request();
        req.append_header("Accept", "application/json").unwrap();
        req.append_header("Accept", "text/plain").unwrap();
        let values: Vec<_> = req.headers().get_all("accept").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn append_query_preserves_existing_pairs() {
        let mut req = ApiRequest::new(
            Method::GET,
            Url::parse("https://api.example.com/search?q=rust").unwrap(),
        );
        req.append_query("page", "2");
        assert_eq!(req.url().query(), Some("q=rust&page=2"));
    }

    #[test]
    fn body_reports_content_type_and_encodes() {
        let body = RequestBody::Json(serde_json::json!({"id": 7}));
        assert_eq!(body.content_type(), "application/json");
        assert_eq!(body.to_bytes().unwrap(), br#"{"id":7}"#);

        let body = RequestBody::Text("hello".to_string());
        assert_eq!(body.content_type(), "text/plain; charset=utf-8");
        assert_eq!(body.to_bytes().unwrap(), b"hello");
    }
}

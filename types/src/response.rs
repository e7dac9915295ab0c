//! The raw result of one completed HTTP exchange.

use bytes::Bytes;
use http::header::HeaderMap;
use http::StatusCode;
use serde::de::DeserializeOwned;

/// A fully buffered HTTP response.
///
/// Any completed exchange is a response - 4xx and 5xx included. Deciding
/// what a non-success status means is the return hook's job, not the
/// transport's.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The body as UTF-8 text.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.body)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiResponse;
    use http::header::HeaderMap;
    use http::StatusCode;

    #[test]
    fn json_deserializes_the_body() {
        let response = ApiResponse::new(StatusCode::OK, HeaderMap::new(), &b"42"[..]);
        assert!(response.is_success());
        assert_eq!(response.json::<i64>().unwrap(), 42);
    }

    #[test]
    fn text_rejects_invalid_utf8() {
        let response = ApiResponse::new(StatusCode::OK, HeaderMap::new(), &b"\xff\xfe"[..]);
        assert!(response.text().is_err());
    }

    #[test]
    fn error_statuses_are_still_responses() {
        let response = ApiResponse::new(
            StatusCode::NOT_FOUND,
            HeaderMap::new(),
            &b"{\"error\":\"missing\"}"[..],
        );
        assert!(!response.is_success());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.text().unwrap(), "{\"error\":\"missing\"}");
    }
}

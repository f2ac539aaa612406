use std::fmt;

use futures_util::stream::BoxStream;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Method, Url,
};

/// A one-shot body stream, as produced by a transport or supplied by a caller.
pub type ByteStream = BoxStream<'static, std::io::Result<Vec<u8>>>;

/// Body attached to an outbound request.
pub enum RequestPayload {
    /// In-memory body; can be sent any number of times.
    Bytes(Vec<u8>),
    /// Streamed body; `None` once it has been handed to the transport.
    Stream(Option<ByteStream>),
}

impl RequestPayload {
    pub fn is_repeatable(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }
}

impl fmt::Debug for RequestPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(stream) => f
                .debug_tuple("Stream")
                .field(&if stream.is_some() { "<pending>" } else { "<consumed>" })
                .finish(),
        }
    }
}

/// Outbound HTTP request as seen by the retry chain.
#[derive(Debug)]
pub struct HttpRequest {
    method: Method,
    endpoint: Url,
    headers: HeaderMap,
    payload: Option<RequestPayload>,
    non_replayable: bool,
}

impl HttpRequest {
    pub fn new(method: Method, endpoint: Url) -> Self {
        Self {
            method,
            endpoint,
            headers: HeaderMap::new(),
            payload: None,
            non_replayable: false,
        }
    }

    pub fn get(endpoint: Url) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// Appends a header value, keeping any existing values for the same name.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.payload = Some(RequestPayload::Bytes(body.into()));
        self
    }

    /// Attaches a streamed body. Such a request cannot be replayed.
    pub fn with_stream_body(mut self, stream: ByteStream) -> Self {
        self.payload = Some(RequestPayload::Stream(Some(stream)));
        self
    }

    /// Marks the request as unsafe to resend regardless of its body.
    pub fn non_replayable(mut self) -> Self {
        self.non_replayable = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn payload(&self) -> Option<&RequestPayload> {
        self.payload.as_ref()
    }

    pub(crate) fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub(crate) fn set_endpoint(&mut self, endpoint: Url) {
        self.endpoint = endpoint;
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub(crate) fn clear_payload(&mut self) {
        self.payload = None;
    }

    pub(crate) fn payload_mut(&mut self) -> Option<&mut RequestPayload> {
        self.payload.as_mut()
    }

    /// Whether the request may be sent again after a failed attempt.
    pub fn is_replayable(&self) -> bool {
        !self.non_replayable
            && self
                .payload
                .as_ref()
                .map_or(true, RequestPayload::is_repeatable)
    }

    pub fn request_line(&self) -> String {
        format!("{} {} HTTP/1.1", self.method, self.endpoint)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;
    use reqwest::{Method, Url};

    use super::HttpRequest;

    fn url(raw: &str) -> Url {
        Url::parse(raw).expect("test url must parse")
    }

    #[test]
    fn bodiless_and_buffered_requests_are_replayable() {
        assert!(HttpRequest::get(url("http://host/")).is_replayable());
        assert!(HttpRequest::new(Method::PUT, url("http://host/"))
            .with_body("data")
            .is_replayable());
    }

    #[test]
    fn streamed_or_marked_requests_are_not_replayable() {
        let streamed = HttpRequest::new(Method::PUT, url("http://host/"))
            .with_stream_body(Box::pin(stream::iter(vec![Ok::<_, std::io::Error>(
                b"x".to_vec(),
            )])));
        assert!(!streamed.is_replayable());
        assert!(!HttpRequest::get(url("http://host/"))
            .non_replayable()
            .is_replayable());
    }

    #[test]
    fn request_line_names_method_and_endpoint() {
        let request = HttpRequest::new(Method::POST, url("https://api.example.com/v1/items?x=1"));
        assert_eq!(
            request.request_line(),
            "POST https://api.example.com/v1/items?x=1 HTTP/1.1"
        );
    }
}

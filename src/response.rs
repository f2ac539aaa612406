use std::{fmt, io, mem};

use futures_util::StreamExt;
use reqwest::{
    header::{AsHeaderName, HeaderMap, HeaderName, HeaderValue},
    StatusCode,
};

use crate::request::ByteStream;

enum Content {
    Buffered(Vec<u8>),
    Streaming(ByteStream),
    Released,
}

/// Body of an inbound response.
///
/// A streamed body holds the underlying connection until it is drained or
/// released. [`Payload::buffer`] swaps it for an in-memory copy so the
/// connection is freed while the content stays readable.
pub struct Payload {
    content: Content,
}

impl Payload {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            content: Content::Buffered(bytes.into()),
        }
    }

    pub fn from_stream(stream: ByteStream) -> Self {
        Self {
            content: Content::Streaming(stream),
        }
    }

    pub fn is_repeatable(&self) -> bool {
        matches!(self.content, Content::Buffered(_))
    }

    pub fn is_released(&self) -> bool {
        matches!(self.content, Content::Released)
    }

    /// Reads the whole body.
    ///
    /// Buffered content stays available afterwards; a stream is consumed and
    /// the payload is left released, also when reading fails midway.
    pub async fn read_to_vec(&mut self) -> io::Result<Vec<u8>> {
        match mem::replace(&mut self.content, Content::Released) {
            Content::Buffered(bytes) => {
                let copy = bytes.clone();
                self.content = Content::Buffered(bytes);
                Ok(copy)
            }
            Content::Streaming(mut stream) => {
                let mut out = Vec::new();
                while let Some(chunk) = stream.next().await {
                    out.extend_from_slice(&chunk?);
                }
                Ok(out)
            }
            Content::Released => Err(io::Error::other("payload already released")),
        }
    }

    pub async fn read_to_string(&mut self) -> io::Result<String> {
        let bytes = self.read_to_vec().await?;
        String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Drains a streamed body into memory, freeing the connection but keeping
    /// the content. No-op for content that is already buffered.
    pub async fn buffer(&mut self) -> io::Result<&[u8]> {
        if let Content::Streaming(_) = self.content {
            let bytes = self.read_to_vec().await?;
            self.content = Content::Buffered(bytes);
        }
        match &self.content {
            Content::Buffered(bytes) => Ok(bytes.as_slice()),
            _ => Err(io::Error::other("payload already released")),
        }
    }

    /// Drops the content and any connection still held by the stream.
    pub fn release(&mut self) {
        self.content = Content::Released;
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            Content::Buffered(bytes) => write!(f, "Payload::Buffered({} bytes)", bytes.len()),
            Content::Streaming(_) => f.write_str("Payload::Streaming"),
            Content::Released => f.write_str("Payload::Released"),
        }
    }
}

/// Inbound HTTP response as seen by the retry chain.
#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    message: Option<String>,
    headers: HeaderMap,
    payload: Option<Payload>,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            message: status.canonical_reason().map(str::to_owned),
            headers: HeaderMap::new(),
            payload: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid text.
    pub fn first_header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Every textual value of a header, in arrival order.
    pub fn header_values<K: AsHeaderName>(&self, name: K) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut Payload> {
        self.payload.as_mut()
    }

    pub fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    /// Full release of the body, if any.
    pub fn release_payload(&mut self) {
        if let Some(payload) = self.payload.as_mut() {
            payload.release();
        }
    }

    /// Releases the connection but keeps the content readable.
    pub async fn buffer_payload(&mut self) -> io::Result<Option<&[u8]>> {
        match self.payload.as_mut() {
            Some(payload) => payload.buffer().await.map(Some),
            None => Ok(None),
        }
    }

    pub fn status_line(&self) -> String {
        match &self.message {
            Some(message) => format!("HTTP/1.1 {} {}", self.status.as_u16(), message),
            None => format!("HTTP/1.1 {}", self.status.as_u16()),
        }
    }
}

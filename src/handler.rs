use async_trait::async_trait;

use crate::{HttpCommand, HttpResponse, HttpResponseError};

/// Decides whether a failed attempt should be sent again.
///
/// Implementations may rewrite the command's request before returning `true`
/// and must leave the response payload released or buffered.
#[async_trait]
pub trait RetryHandler: Send + Sync {
    async fn should_retry_request(
        &self,
        command: &mut HttpCommand,
        response: &mut HttpResponse,
    ) -> bool;
}

/// Turns a response that will not be retried into the command's error.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    async fn handle_error(&self, command: &mut HttpCommand, response: &mut HttpResponse);
}

/// Never retries. Default strategy for 4xx responses.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverRetryHandler;

#[async_trait]
impl RetryHandler for NeverRetryHandler {
    async fn should_retry_request(
        &self,
        _command: &mut HttpCommand,
        _response: &mut HttpResponse,
    ) -> bool {
        false
    }
}

/// Reads the body as text, records an [`HttpResponseError`] on the command,
/// then releases the payload whether or not the read succeeded.
#[derive(Clone, Copy, Debug, Default)]
pub struct CloseContentAndSetErrorHandler;

#[async_trait]
impl ErrorHandler for CloseContentAndSetErrorHandler {
    async fn handle_error(&self, command: &mut HttpCommand, response: &mut HttpResponse) {
        let content = match response.payload_mut() {
            Some(payload) => match payload.read_to_vec().await {
                Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("could not read error body: {}", _err);
                    None
                }
            },
            None => None,
        };

        let error = HttpResponseError {
            request_line: command.current_request().request_line(),
            status_line: response.status_line(),
            status: response.status(),
            headers: response.headers().clone(),
            content,
        };
        command.set_error(error.into());
        response.release_payload();
    }
}

#[cfg(test)]
mod tests {
    use std::{io, sync::atomic::Ordering};

    use reqwest::{
        header::{HeaderValue, CONTENT_TYPE},
        StatusCode, Url,
    };

    use super::{CloseContentAndSetErrorHandler, ErrorHandler, NeverRetryHandler, RetryHandler};
    use crate::{
        response::tests::tracked_stream, HttpCommand, HttpError, HttpRequest, HttpResponse,
        Payload,
    };

    fn command() -> HttpCommand {
        HttpCommand::new(HttpRequest::get(
            Url::parse("http://host/items/1").expect("test url must parse"),
        ))
    }

    #[tokio::test]
    async fn never_retry_declines() {
        let mut cmd = command();
        let mut response = HttpResponse::new(StatusCode::UNAUTHORIZED);
        assert!(!NeverRetryHandler.should_retry_request(&mut cmd, &mut response).await);
        assert_eq!(cmd.failure_count(), 0);
    }

    #[tokio::test]
    async fn error_carries_status_headers_and_body_text() {
        let mut cmd = command();
        let mut response = HttpResponse::new(StatusCode::NOT_FOUND)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
            .with_payload(Payload::from_bytes("no such item"));

        CloseContentAndSetErrorHandler
            .handle_error(&mut cmd, &mut response)
            .await;

        match cmd.take_error() {
            Some(HttpError::Response(err)) => {
                assert_eq!(err.status, StatusCode::NOT_FOUND);
                assert_eq!(err.content.as_deref(), Some("no such item"));
                assert_eq!(
                    err.headers.get(CONTENT_TYPE),
                    Some(&HeaderValue::from_static("text/plain"))
                );
                assert_eq!(err.request_line, "GET http://host/items/1 HTTP/1.1");
            }
            other => panic!("expected response error, got {other:?}"),
        }
        assert!(response.payload().is_some_and(|p| p.is_released()));
    }

    #[tokio::test]
    async fn unreadable_body_still_sets_error_and_releases_once() {
        let (body, drops) = tracked_stream(vec![Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated",
        ))]);
        let mut cmd = command();
        let mut response =
            HttpResponse::new(StatusCode::BAD_GATEWAY).with_payload(Payload::from_stream(body));

        CloseContentAndSetErrorHandler
            .handle_error(&mut cmd, &mut response)
            .await;

        match cmd.error() {
            Some(HttpError::Response(err)) => assert!(err.content.is_none()),
            other => panic!("expected response error, got {other:?}"),
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(response.payload().is_some_and(|p| p.is_released()));
    }

    #[tokio::test]
    async fn bodiless_error_has_no_content() {
        let mut cmd = command();
        let mut response = HttpResponse::new(StatusCode::FORBIDDEN);

        CloseContentAndSetErrorHandler
            .handle_error(&mut cmd, &mut response)
            .await;

        assert_eq!(cmd.error().and_then(HttpError::status), Some(StatusCode::FORBIDDEN));
    }
}

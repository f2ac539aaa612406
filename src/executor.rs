use std::{fmt, io, sync::Arc, time::Duration};

use futures_util::StreamExt;
use reqwest::redirect;
use tokio::sync::watch;

use crate::{
    delegate::{DelegatingErrorHandler, DelegatingRetryHandler, ErrorHandlers, RetryHandlers},
    handler::{ErrorHandler, RetryHandler},
    request::RequestPayload,
    BackoffLimitedRetryHandler, ClientOptions, HttpCommand, HttpError, HttpRequest,
    HttpResponse, HttpResponseError, Payload, Result,
};

/// Sends commands over `reqwest`, consulting the retry chain after every
/// failed attempt.
///
/// Redirects are never followed by `reqwest` itself; they go through the
/// redirection strategy so the command's redirect ceiling applies.
#[derive(Clone)]
pub struct HttpCommandExecutor {
    http: reqwest::Client,
    options: ClientOptions,
    backoff: Arc<BackoffLimitedRetryHandler>,
    retry_handler: DelegatingRetryHandler,
    error_handler: DelegatingErrorHandler,
}

impl fmt::Debug for HttpCommandExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpCommandExecutor")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl HttpCommandExecutor {
    /// Creates an executor with default options and strategies.
    pub fn new() -> Result<Self> {
        Self::with_options(ClientOptions::default())
    }

    /// Creates an executor whose timeout, ceilings and backoff come from `opts`.
    pub fn with_options(opts: ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .redirect(redirect::Policy::none())
            .timeout(Duration::from_millis(opts.timeout_ms))
            .build()
            .map_err(HttpError::Transport)?;
        Ok(Self {
            http,
            backoff: Arc::new(BackoffLimitedRetryHandler::from_options(&opts)),
            retry_handler: DelegatingRetryHandler::from_options(&opts),
            error_handler: DelegatingErrorHandler::default(),
            options: opts,
        })
    }

    /// Replaces the per-status-class retry strategies.
    pub fn with_retry_handlers(mut self, handlers: RetryHandlers) -> Self {
        self.retry_handler = DelegatingRetryHandler::new(handlers);
        self
    }

    /// Replaces the per-status-class error strategies.
    pub fn with_error_handlers(mut self, handlers: ErrorHandlers) -> Self {
        self.error_handler = DelegatingErrorHandler::new(handlers);
        self
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends `request` as a fresh command.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut command = HttpCommand::new(request);
        self.invoke(&mut command).await
    }

    /// Like [`execute`](Self::execute), but any backoff wait is abandoned as
    /// soon as `interrupt` turns `true`.
    pub async fn execute_with_interrupt(
        &self,
        request: HttpRequest,
        interrupt: watch::Receiver<bool>,
    ) -> Result<HttpResponse> {
        let mut command = HttpCommand::new(request).with_interrupt(interrupt);
        self.invoke(&mut command).await
    }

    /// Runs `command` until a response below 300 arrives or the chain gives up.
    ///
    /// On success the response body is still streaming. On failure the error
    /// recorded on the command is returned and taken off it.
    pub async fn invoke(&self, command: &mut HttpCommand) -> Result<HttpResponse> {
        loop {
            let mut response = match self.send_once(command).await {
                Ok(response) => response,
                Err(err) => {
                    if !command.has_error()
                        && should_retry_transport(&err)
                        && self.backoff.should_retry_io_error(command, &err).await
                    {
                        continue;
                    }
                    return Err(command
                        .take_error()
                        .unwrap_or(HttpError::Transport(err)));
                }
            };

            if response.status().as_u16() < 300 {
                return Ok(response);
            }

            if self
                .retry_handler
                .should_retry_request(command, &mut response)
                .await
            {
                continue;
            }

            if let Some(err) = command.take_error() {
                response.release_payload();
                return Err(err);
            }

            self.error_handler.handle_error(command, &mut response).await;
            response.release_payload();
            return Err(command
                .take_error()
                .unwrap_or_else(|| bare_response_error(command, &response)));
        }
    }

    async fn send_once(
        &self,
        command: &mut HttpCommand,
    ) -> std::result::Result<HttpResponse, reqwest::Error> {
        let request = command.current_request_mut();

        #[cfg(feature = "tracing")]
        tracing::debug!("sending {}", request.request_line());

        let mut builder = self
            .http
            .request(request.method().clone(), request.endpoint().clone())
            .headers(request.headers().clone());
        match request.payload_mut() {
            Some(RequestPayload::Bytes(bytes)) => builder = builder.body(bytes.clone()),
            Some(RequestPayload::Stream(stream)) => {
                if let Some(stream) = stream.take() {
                    builder = builder.body(reqwest::Body::wrap_stream(stream));
                }
            }
            None => {}
        }

        let response = builder.send().await?;
        Ok(into_http_response(response))
    }
}

/// Connection, timeout and body failures may clear up on a later attempt.
/// Builder errors (bad scheme, malformed request) never do.
fn should_retry_transport(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_request() || err.is_body() || err.is_connect()
}

fn into_http_response(response: reqwest::Response) -> HttpResponse {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(io::Error::other));
    HttpResponse::new(status)
        .with_headers(headers)
        .with_payload(Payload::from_stream(Box::pin(body)))
}

/// Used when a custom error strategy leaves no error on the command.
fn bare_response_error(command: &HttpCommand, response: &HttpResponse) -> HttpError {
    HttpResponseError {
        request_line: command.current_request().request_line(),
        status_line: response.status_line(),
        status: response.status(),
        headers: response.headers().clone(),
        content: None,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::{should_retry_transport, HttpCommandExecutor};
    use crate::ClientOptions;

    #[test]
    fn debug_shows_options_only() {
        let executor = HttpCommandExecutor::with_options(ClientOptions {
            max_redirects: 2,
            ..ClientOptions::default()
        })
        .expect("client must build");
        let debug = format!("{executor:?}");
        assert!(debug.contains("max_redirects: 2"));
        assert!(!debug.contains("retry_handler"));
    }

    #[tokio::test]
    async fn builder_errors_are_not_retryable() {
        let err = reqwest::Client::new()
            .get("ftp://127.0.0.1/x")
            .send()
            .await
            .expect_err("unsupported scheme must fail");
        assert!(err.is_builder());
        assert!(!should_retry_transport(&err));
    }
}

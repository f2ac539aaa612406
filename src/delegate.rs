use std::{fmt, sync::Arc};

use async_trait::async_trait;

use crate::{
    handler::{CloseContentAndSetErrorHandler, ErrorHandler, NeverRetryHandler, RetryHandler},
    BackoffLimitedRetryHandler, ClientOptions, HttpCommand, HttpResponse,
    RedirectionRetryHandler,
};

/// Retry strategy for each status class.
#[derive(Clone)]
pub struct RetryHandlers {
    /// 3xx responses.
    pub redirection: Arc<dyn RetryHandler>,
    /// 4xx responses.
    pub client_error: Arc<dyn RetryHandler>,
    /// 5xx and above.
    pub server_error: Arc<dyn RetryHandler>,
}

impl RetryHandlers {
    /// Redirects are followed, 4xx never retried, 5xx backed off.
    /// The redirect handler shares the server-error backoff.
    pub fn from_options(opts: &ClientOptions) -> Self {
        let backoff = Arc::new(BackoffLimitedRetryHandler::from_options(opts));
        Self {
            redirection: Arc::new(RedirectionRetryHandler::new(
                opts.max_redirects,
                backoff.clone(),
            )),
            client_error: Arc::new(NeverRetryHandler),
            server_error: backoff,
        }
    }
}

impl Default for RetryHandlers {
    fn default() -> Self {
        Self::from_options(&ClientOptions::default())
    }
}

impl fmt::Debug for RetryHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandlers").finish_non_exhaustive()
    }
}

/// Error strategy for each status class.
#[derive(Clone)]
pub struct ErrorHandlers {
    pub redirection: Arc<dyn ErrorHandler>,
    pub client_error: Arc<dyn ErrorHandler>,
    pub server_error: Arc<dyn ErrorHandler>,
}

impl Default for ErrorHandlers {
    fn default() -> Self {
        let handler: Arc<dyn ErrorHandler> = Arc::new(CloseContentAndSetErrorHandler);
        Self {
            redirection: handler.clone(),
            client_error: handler.clone(),
            server_error: handler,
        }
    }
}

impl fmt::Debug for ErrorHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHandlers").finish_non_exhaustive()
    }
}

/// Routes a failed response to the retry strategy for its status class.
#[derive(Clone, Debug, Default)]
pub struct DelegatingRetryHandler {
    handlers: RetryHandlers,
}

impl DelegatingRetryHandler {
    pub fn new(handlers: RetryHandlers) -> Self {
        Self { handlers }
    }

    pub fn from_options(opts: &ClientOptions) -> Self {
        Self::new(RetryHandlers::from_options(opts))
    }
}

#[async_trait]
impl RetryHandler for DelegatingRetryHandler {
    async fn should_retry_request(
        &self,
        command: &mut HttpCommand,
        response: &mut HttpResponse,
    ) -> bool {
        if command.has_error() {
            return false;
        }
        let handler = match response.status().as_u16() {
            300..=399 => &self.handlers.redirection,
            400..=499 => &self.handlers.client_error,
            500.. => &self.handlers.server_error,
            _ => return false,
        };
        handler.should_retry_request(command, response).await
    }
}

/// Routes a response that will not be retried to the error strategy for its
/// status class. Statuses below 300 fall through to the server-error handler.
#[derive(Clone, Debug, Default)]
pub struct DelegatingErrorHandler {
    handlers: ErrorHandlers,
}

impl DelegatingErrorHandler {
    pub fn new(handlers: ErrorHandlers) -> Self {
        Self { handlers }
    }
}

#[async_trait]
impl ErrorHandler for DelegatingErrorHandler {
    async fn handle_error(&self, command: &mut HttpCommand, response: &mut HttpResponse) {
        let handler = match response.status().as_u16() {
            300..=399 => &self.handlers.redirection,
            400..=499 => &self.handlers.client_error,
            _ => &self.handlers.server_error,
        };
        handler.handle_error(command, response).await;
    }
}

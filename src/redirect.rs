use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, HOST, LOCATION},
    Method, StatusCode, Url,
};

use crate::{
    handler::RetryHandler, location::Location, BackoffLimitedRetryHandler, ClientOptions,
    HttpCommand, HttpResponse,
};

/// Follows `Location` on 3xx responses by rewriting the command's endpoint,
/// up to `max_redirects` hops.
///
/// A location naming the current endpoint exactly is treated as a transient
/// server hiccup and handed to the backoff handler instead.
#[derive(Clone, Debug)]
pub struct RedirectionRetryHandler {
    max_redirects: u32,
    backoff: Arc<BackoffLimitedRetryHandler>,
}

impl RedirectionRetryHandler {
    pub fn new(max_redirects: u32, backoff: Arc<BackoffLimitedRetryHandler>) -> Self {
        Self {
            max_redirects,
            backoff,
        }
    }

    pub fn from_options(opts: &ClientOptions) -> Self {
        Self::new(
            opts.max_redirects,
            Arc::new(BackoffLimitedRetryHandler::from_options(opts)),
        )
    }

    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }
}

#[async_trait]
impl RetryHandler for RedirectionRetryHandler {
    async fn should_retry_request(
        &self,
        command: &mut HttpCommand,
        response: &mut HttpResponse,
    ) -> bool {
        // Free the connection; callers may still want the 3xx body.
        if let Err(_err) = response.buffer_payload().await {
            #[cfg(feature = "tracing")]
            tracing::warn!("could not buffer redirect body: {}", _err);
        }

        let see_other = response.status() == StatusCode::SEE_OTHER;
        if !command.is_replayable() && !see_other {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "cannot follow redirect, command is not replayable: {}",
                command.current_request().request_line()
            );
            return false;
        }

        let Some(raw) = response.first_header(LOCATION).map(str::to_owned) else {
            return false;
        };
        let redirects = command.increment_redirect_count();
        if redirects > self.max_redirects {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "cannot follow redirect to {}, command has exceeded redirect limit {}: {}",
                raw,
                self.max_redirects,
                command.current_request().request_line()
            );
            return false;
        }

        let location = match Location::parse(&raw) {
            Ok(location) => location,
            Err(err) => {
                command.set_error(err);
                return false;
            }
        };

        if location.is_same_target(command.current_request().endpoint()) {
            return self.backoff.should_retry_request(command, response).await;
        }

        let endpoint = match location.merge_into(command.current_request().endpoint()) {
            Ok(endpoint) => endpoint,
            Err(err) => {
                command.set_error(err);
                return false;
            }
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "redirect {}/{}: {} -> {}",
            redirects,
            self.max_redirects,
            command.current_request().endpoint(),
            endpoint
        );

        let request = command.current_request_mut();
        if see_other && !matches!(*request.method(), Method::GET | Method::HEAD) {
            request.set_method(Method::GET);
            request.clear_payload();
            request.headers_mut().remove(CONTENT_TYPE);
            request.headers_mut().remove(CONTENT_LENGTH);
        }
        if location.host().is_some() && request.headers().contains_key(HOST) {
            if let Some(value) = host_header(&endpoint) {
                request.headers_mut().insert(HOST, value);
            }
        }
        request.set_endpoint(endpoint);
        true
    }
}

fn host_header(endpoint: &Url) -> Option<HeaderValue> {
    let host = endpoint.host_str()?;
    let value = match endpoint.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };
    HeaderValue::from_str(&value).ok()
}

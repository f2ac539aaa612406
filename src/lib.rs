//! `http-retry-chain` decides what happens after a failed HTTP attempt.
//!
//! Each failed response is routed by status class:
//! - 3xx to [`RedirectionRetryHandler`], which rewrites the endpoint from `Location`
//! - 4xx to [`NeverRetryHandler`]
//! - 5xx to [`BackoffLimitedRetryHandler`], which waits `50ms * n^2` before retry `n`
//!
//! When no retry follows, an [`ErrorHandler`] turns the response into an
//! [`HttpError`] carrying the status, headers and body text.
//! [`HttpCommandExecutor`] drives the whole chain over `reqwest`.

mod backoff;
mod command;
mod delegate;
mod error;
mod executor;
mod handler;
mod location;
mod options;
mod redirect;
mod request;
mod response;

pub use backoff::{backoff_delay, impose_backoff_exponential_delay, BackoffLimitedRetryHandler};
pub use command::HttpCommand;
pub use delegate::{DelegatingErrorHandler, DelegatingRetryHandler, ErrorHandlers, RetryHandlers};
pub use error::{HttpError, HttpResponseError};
pub use executor::HttpCommandExecutor;
pub use handler::{CloseContentAndSetErrorHandler, ErrorHandler, NeverRetryHandler, RetryHandler};
pub use location::Location;
pub use options::ClientOptions;
pub use redirect::RedirectionRetryHandler;
pub use request::{ByteStream, HttpRequest, RequestPayload};
pub use response::{HttpResponse, Payload};

pub type Result<T> = std::result::Result<T, HttpError>;

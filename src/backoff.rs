use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::watch, time::sleep};

use crate::{handler::RetryHandler, ClientOptions, HttpCommand, HttpError, HttpResponse};

/// Retries replayable commands with a quadratic delay until the failure
/// count passes `max_retries`.
///
/// Attempt `n` waits `delay_start * n^2`: 50, 200, 450, 800 and 1250 ms for
/// the default 50 ms start.
#[derive(Clone, Debug)]
pub struct BackoffLimitedRetryHandler {
    max_retries: u32,
    delay_start: Duration,
}

impl Default for BackoffLimitedRetryHandler {
    fn default() -> Self {
        Self::from_options(&ClientOptions::default())
    }
}

impl BackoffLimitedRetryHandler {
    pub fn new(max_retries: u32, delay_start: Duration) -> Self {
        Self {
            max_retries,
            delay_start,
        }
    }

    pub fn from_options(opts: &ClientOptions) -> Self {
        Self::new(
            opts.max_retries,
            Duration::from_millis(opts.retry_delay_start_ms),
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay imposed before the attempt following failure number `failure_count`.
    pub fn delay_for(&self, failure_count: u32) -> Duration {
        backoff_delay(self.delay_start, 2, failure_count)
    }

    /// Retry decision for a transport failure where no response was received.
    pub async fn should_retry_io_error(
        &self,
        command: &mut HttpCommand,
        _error: &(dyn std::error::Error + Send + Sync),
    ) -> bool {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "transport error on {}: {}",
            command.current_request().request_line(),
            _error
        );
        self.if_replayable_backoff(command).await
    }

    async fn if_replayable_backoff(&self, command: &mut HttpCommand) -> bool {
        if !command.is_replayable() {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "cannot retry after server error, command is not replayable: {}",
                command.current_request().request_line()
            );
            return false;
        }

        let failures = command.increment_failure_count();
        if failures > self.max_retries {
            #[cfg(feature = "tracing")]
            tracing::error!(
                "cannot retry after server error, command has exceeded retry limit {}: {}",
                self.max_retries,
                command.current_request().request_line()
            );
            return false;
        }

        self.impose_backoff_delay(command, failures).await
    }

    /// Waits out the delay for `failure_count`. Returns `false` and records
    /// [`HttpError::Interrupted`] when the command's interrupt fires first.
    pub async fn impose_backoff_delay(&self, command: &mut HttpCommand, failure_count: u32) -> bool {
        let delay = self.delay_for(failure_count);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "retry {}/{}: delaying for {} ms: {}",
            failure_count,
            self.max_retries,
            delay.as_millis(),
            command.current_request().request_line()
        );

        if sleep_unless_interrupted(delay, command.interrupt()).await {
            true
        } else {
            #[cfg(feature = "tracing")]
            tracing::warn!(
                "backoff interrupted after {} failures: {}",
                failure_count,
                command.current_request().request_line()
            );
            command.set_error(HttpError::Interrupted);
            false
        }
    }
}

#[async_trait]
impl RetryHandler for BackoffLimitedRetryHandler {
    async fn should_retry_request(
        &self,
        command: &mut HttpCommand,
        response: &mut HttpResponse,
    ) -> bool {
        // Frees the connection; the error path still needs the body text.
        if let Err(_err) = response.buffer_payload().await {
            #[cfg(feature = "tracing")]
            tracing::warn!("could not buffer error body: {}", _err);
        }
        self.if_replayable_backoff(command).await
    }
}

/// `period * failure_count^pow`, saturating instead of overflowing.
pub fn backoff_delay(period: Duration, pow: u32, failure_count: u32) -> Duration {
    let factor = u64::from(failure_count).saturating_pow(pow);
    period.saturating_mul(u32::try_from(factor).unwrap_or(u32::MAX))
}

/// Waits `period * failure_count^pow` for callers retrying outside an
/// [`HttpCommand`], such as a connection loop. `max` and `message` only feed
/// the debug log.
pub async fn impose_backoff_exponential_delay(
    period: Duration,
    pow: u32,
    failure_count: u32,
    max: u32,
    message: &str,
) {
    let delay = backoff_delay(period, pow, failure_count);

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "retry {}/{}: delaying for {} ms: {}",
        failure_count,
        max,
        delay.as_millis(),
        message
    );
    #[cfg(not(feature = "tracing"))]
    let _ = (max, message);

    sleep(delay).await;
}

/// Sleeps for `delay`. Returns `false` if `interrupt` turned `true` first.
async fn sleep_unless_interrupted(delay: Duration, interrupt: Option<watch::Receiver<bool>>) -> bool {
    let Some(mut interrupt) = interrupt else {
        sleep(delay).await;
        return true;
    };
    if *interrupt.borrow() {
        return false;
    }
    tokio::select! {
        _ = sleep(delay) => true,
        _ = wait_for_interrupt(&mut interrupt) => false,
    }
}

async fn wait_for_interrupt(interrupt: &mut watch::Receiver<bool>) {
    loop {
        if interrupt.changed().await.is_err() {
            // Sender gone: the signal can no longer fire.
            std::future::pending::<()>().await;
        }
        if *interrupt.borrow() {
            return;
        }
    }
}

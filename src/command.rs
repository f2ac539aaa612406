use tokio::sync::watch;

use crate::{HttpError, HttpRequest};

/// One logical outbound call plus its retry bookkeeping.
///
/// Owned by the call site and handed by `&mut` to each handler in turn;
/// attempts for a command are strictly sequential.
#[derive(Debug)]
pub struct HttpCommand {
    request: HttpRequest,
    failure_count: u32,
    redirect_count: u32,
    error: Option<HttpError>,
    interrupt: Option<watch::Receiver<bool>>,
}

impl HttpCommand {
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request,
            failure_count: 0,
            redirect_count: 0,
            error: None,
            interrupt: None,
        }
    }

    /// Registers a signal that aborts any backoff wait once it turns `true`.
    pub fn with_interrupt(mut self, interrupt: watch::Receiver<bool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    pub fn current_request(&self) -> &HttpRequest {
        &self.request
    }

    pub(crate) fn current_request_mut(&mut self) -> &mut HttpRequest {
        &mut self.request
    }

    pub fn set_current_request(&mut self, request: HttpRequest) {
        self.request = request;
    }

    pub fn is_replayable(&self) -> bool {
        self.request.is_replayable()
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    /// Returns the new failure count.
    pub fn increment_failure_count(&mut self) -> u32 {
        self.failure_count = self.failure_count.saturating_add(1);
        self.failure_count
    }

    pub fn redirect_count(&self) -> u32 {
        self.redirect_count
    }

    /// Returns the new redirect count.
    pub fn increment_redirect_count(&mut self) -> u32 {
        self.redirect_count = self.redirect_count.saturating_add(1);
        self.redirect_count
    }

    pub fn error(&self) -> Option<&HttpError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Records the error surfaced to the caller. No retry follows once set.
    pub fn set_error(&mut self, error: HttpError) {
        self.error = Some(error);
    }

    pub fn take_error(&mut self) -> Option<HttpError> {
        self.error.take()
    }

    pub(crate) fn interrupt(&self) -> Option<watch::Receiver<bool>> {
        self.interrupt.clone()
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Url;

    use super::HttpCommand;
    use crate::{HttpError, HttpRequest};

    fn command() -> HttpCommand {
        HttpCommand::new(HttpRequest::get(
            Url::parse("http://host/").expect("test url must parse"),
        ))
    }

    #[test]
    fn counters_start_at_zero_and_only_grow() {
        let mut cmd = command();
        assert_eq!((cmd.failure_count(), cmd.redirect_count()), (0, 0));
        assert_eq!(cmd.increment_failure_count(), 1);
        assert_eq!(cmd.increment_failure_count(), 2);
        assert_eq!(cmd.increment_redirect_count(), 1);
        assert_eq!((cmd.failure_count(), cmd.redirect_count()), (2, 1));
    }

    #[test]
    fn error_can_be_set_and_taken() {
        let mut cmd = command();
        assert!(!cmd.has_error());
        cmd.set_error(HttpError::Interrupted);
        assert!(matches!(cmd.error(), Some(HttpError::Interrupted)));
        assert!(matches!(cmd.take_error(), Some(HttpError::Interrupted)));
        assert!(!cmd.has_error());
    }
}

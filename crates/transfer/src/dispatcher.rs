//! One request, one completion.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::pause::PauseGate;
use crate::progress::ProgressReporter;
use crate::request::UploadRequest;
use crate::transport::{Reply, Transport};

/// Result of [`RequestDispatcher::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The gate was closed at dispatch time; nothing was sent and no
    /// completion will follow.
    NotIssued,
    /// The single completion of the request. `None` means no usable reply:
    /// the transport failed, or the gate closed while the request was in
    /// flight.
    Completed(Option<Reply>),
}

/// Issues requests through a [`Transport`] under a [`PauseGate`].
#[derive(Clone)]
pub struct RequestDispatcher {
    transport: Arc<dyn Transport>,
    gate: PauseGate,
}

impl RequestDispatcher {
    pub fn new(transport: Arc<dyn Transport>, gate: PauseGate) -> Self {
        Self { transport, gate }
    }

    pub fn gate(&self) -> &PauseGate {
        &self.gate
    }

    /// Sends `request` and waits for its completion.
    ///
    /// The request and everything it owns (attachment buffer, body stream)
    /// is dropped before this returns.
    pub async fn dispatch(
        &self,
        request: UploadRequest,
        progress: ProgressReporter,
    ) -> DispatchOutcome {
        if self.gate.is_paused() {
            debug!(command = %request.command, "upload paused, request not issued");
            return DispatchOutcome::NotIssued;
        }

        let command = request.command;
        debug!(%command, url = %request.url, "request url");

        let result = self.transport.post(request, progress).await;

        if self.gate.is_paused() {
            info!(%command, "upload paused while request was in flight, reply discarded");
            return DispatchOutcome::Completed(None);
        }

        match result {
            Ok(reply) => {
                debug!(%command, http_status = reply.http_status, body = %reply.body, "reply");
                DispatchOutcome::Completed(Some(reply))
            }
            Err(e) => {
                warn!(%command, error = %e, "bad reply");
                DispatchOutcome::Completed(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransferError;
    use crate::transport::TransportFuture;
    use osvup_protocol::Command;
    use std::sync::Mutex;

    /// Mock transport that records requests and replays canned results.
    struct MockTransport {
        replies: Mutex<Vec<Result<Reply, TransferError>>>,
        requests: Mutex<Vec<UploadRequest>>,
        /// Closed by the mock while the request is "in flight".
        pause_during: Option<PauseGate>,
    }

    impl MockTransport {
        fn new(replies: Vec<Result<Reply, TransferError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                requests: Mutex::new(Vec::new()),
                pause_during: None,
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl Transport for MockTransport {
        fn post(&self, request: UploadRequest, progress: ProgressReporter) -> TransportFuture<'_> {
            self.requests.lock().unwrap().push(request);
            Box::pin(async move {
                progress.advance(3);
                if let Some(gate) = &self.pause_during {
                    gate.pause();
                }
                let mut replies = self.replies.lock().unwrap();
                if replies.is_empty() {
                    Err(TransferError::Io(std::io::Error::other("no mock reply")))
                } else {
                    replies.remove(0)
                }
            })
        }
    }

    fn request() -> UploadRequest {
        UploadRequest::form(Command::SequenceFinished, "http://h/").field("sequenceId", "1")
    }

    #[tokio::test]
    async fn completes_with_reply() {
        let mock = Arc::new(MockTransport::new(vec![Ok(Reply::new(200, "{}"))]));
        let dispatcher = RequestDispatcher::new(mock.clone(), PauseGate::new());

        let outcome = dispatcher.dispatch(request(), ProgressReporter::silent()).await;
        assert_eq!(outcome, DispatchOutcome::Completed(Some(Reply::new(200, "{}"))));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn transport_error_is_no_reply() {
        let mock = Arc::new(MockTransport::new(vec![]));
        let dispatcher = RequestDispatcher::new(mock.clone(), PauseGate::new());

        let outcome = dispatcher.dispatch(request(), ProgressReporter::silent()).await;
        assert_eq!(outcome, DispatchOutcome::Completed(None));
    }

    #[tokio::test]
    async fn paused_gate_issues_nothing() {
        let mock = Arc::new(MockTransport::new(vec![Ok(Reply::new(200, "{}"))]));
        let gate = PauseGate::new();
        gate.pause();
        let dispatcher = RequestDispatcher::new(mock.clone(), gate);

        let progress = ProgressReporter::silent();
        let outcome = dispatcher.dispatch(request(), progress.clone()).await;
        assert_eq!(outcome, DispatchOutcome::NotIssued);
        assert_eq!(mock.request_count(), 0);
        assert_eq!(progress.bytes_sent(), 0);
    }

    #[tokio::test]
    async fn pause_in_flight_overrides_success() {
        let gate = PauseGate::new();
        let mut mock = MockTransport::new(vec![Ok(Reply::new(200, r#"{"status":{"apiCode":"600"}}"#))]);
        mock.pause_during = Some(gate.clone());
        let mock = Arc::new(mock);
        let dispatcher = RequestDispatcher::new(mock.clone(), gate.clone());

        let outcome = dispatcher.dispatch(request(), ProgressReporter::silent()).await;
        assert_eq!(outcome, DispatchOutcome::Completed(None));
        assert_eq!(mock.request_count(), 1);
        assert!(gate.is_paused());
    }

    #[tokio::test]
    async fn progress_is_forwarded() {
        let mock = Arc::new(MockTransport::new(vec![Ok(Reply::new(200, "{}"))]));
        let dispatcher = RequestDispatcher::new(mock, PauseGate::new());

        let progress = ProgressReporter::silent();
        dispatcher.dispatch(request(), progress.clone()).await;
        assert_eq!(progress.bytes_sent(), 3);
    }
}

//! Per-request context: caller identity, cancellation and deadline.

use std::future::Future;
use std::time::Duration;

use objstack_core::Identity;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{S3ServiceError, S3ServiceResult};

/// Context every engine operation runs under.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use objstack_core::Identity;
/// use objstack_s3_core::context::RequestContext;
///
/// let ctx = RequestContext::new(Identity::Anonymous).with_timeout(Duration::from_secs(30));
/// assert!(!ctx.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    identity: Identity,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context with a fresh cancellation token and no deadline.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// An anonymous context.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new(Identity::Anonymous)
    }

    /// Tie this request to an externally owned token (e.g. the connection's).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Abort the request once `timeout` has elapsed from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Abort the request at `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The caller.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The request's cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the request has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast if the request is already cancelled or past its deadline.
    pub fn check(&self) -> S3ServiceResult<()> {
        if self.cancel.is_cancelled() {
            return Err(S3ServiceError::RequestCancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(S3ServiceError::RequestTimeout);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless the request is cancelled or times out
    /// first. A future that loses the race is dropped, which releases
    /// whatever it had staged.
    pub async fn run<F, T>(&self, fut: F) -> S3ServiceResult<T>
    where
        F: Future<Output = S3ServiceResult<T>>,
    {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(S3ServiceError::RequestCancelled),
            () = deadline => Err(S3ServiceError::RequestTimeout),
            result = fut => result,
        }
    }
}

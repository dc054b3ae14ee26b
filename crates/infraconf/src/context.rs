//! cancellation and deadlines for blocking work
//!
//! File reads and [crate::SecretsProvider] calls are the only blocking operations of a resolve.
//! Both receive a [Context] and give up as soon as it is cancelled or past its deadline.
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Fails once the context is cancelled or its deadline has passed
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.token.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cancelled_token_interrupts() {
        let cx = Context::background();
        assert_eq!(cx.check(), Ok(()));

        let child = cx.clone();
        cx.cancel();
        assert_eq!(child.check(), Err(Interrupted::Cancelled));
    }

    #[test]
    fn past_deadline_interrupts() {
        let cx = Context::background().with_deadline(Instant::now());
        assert_eq!(cx.check(), Err(Interrupted::DeadlineExceeded));
    }
}

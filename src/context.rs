use std::future::Future;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use crate::error::{AppError, StoreError};

/// Caller-supplied bound on how long an operation may wait on collaborators.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Self { at: None }
    }

    /// A duration too large to represent as an instant means no bound.
    pub fn after(duration: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(duration),
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    pub fn check(&self, operation: &'static str) -> Result<(), AppError> {
        if self.is_expired() {
            return Err(AppError::Timeout(operation));
        }
        Ok(())
    }

    /// Runs a collaborator call under this deadline, mapping store failures
    /// into the public taxonomy.
    pub async fn run<T, F>(&self, operation: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let result = match self.at {
            Some(at) => timeout_at(at, call)
                .await
                .map_err(|_| AppError::Timeout(operation))?,
            None => call.await,
        };

        result.map_err(|err| AppError::from_store(operation, err))
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

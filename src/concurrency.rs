//! Shared deadline observed at every collaborator call and backoff sleep.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Marker returned when the deadline passes before a future completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;

/// Absolute point in time after which in-flight work is abandoned.
/// `Deadline::none()` never expires.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn none() -> Self {
        Self { at: None }
    }

    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Some(Instant::now() + timeout),
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    pub fn is_expired(&self) -> bool {
        self.at.map(|at| Instant::now() >= at).unwrap_or(false)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Run `future`, dropping it if the deadline passes first.
    pub async fn run<F, T>(&self, future: F) -> Result<T, DeadlineExceeded>
    where
        F: Future<Output = T>,
    {
        match self.at {
            Some(at) => tokio::time::timeout_at(at, future)
                .await
                .map_err(|_| DeadlineExceeded),
            None => Ok(future.await),
        }
    }

    /// Sleep for `duration`, waking early at the deadline.
    pub async fn sleep(&self, duration: Duration) -> Result<(), DeadlineExceeded> {
        self.run(tokio::time::sleep(duration)).await?;
        if self.is_expired() {
            return Err(DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves when the deadline passes; pending forever for `none()`.
    pub async fn expired(&self) {
        match self.at {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    }
}

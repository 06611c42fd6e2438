//! Bounded convergence polling
//!
//! A poller probes an external resource at a fixed interval until a verdict
//! says it converged, failed terminally, or the attempt budget runs out.
//! Cancellation is only observed between attempts, never during a probe.

use crate::error::{ResourceError, Result};
use pragma_config::{PollSettings, Settings};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Judgement on one observation of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Desired state reached
    Ready,
    /// Still moving, keep polling
    Pending,
    /// Terminal state that can never become ready; carries the observed status
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ConvergencePoller {
    interval: Duration,
    max_attempts: u32,
    cancel: Option<CancellationToken>,
}

impl ConvergencePoller {
    /// A zero attempt budget is raised to one so at least one probe runs.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
            cancel: None,
        }
    }

    pub fn from_settings(poll: PollSettings) -> Self {
        Self::new(poll.interval(), poll.max_attempts)
    }

    /// Poller for `provider/resource`: the settings override when present,
    /// otherwise the resource's own default.
    pub fn for_resource(
        settings: &Settings,
        provider: &str,
        resource: &str,
        default: PollSettings,
    ) -> Self {
        Self::from_settings(settings.poll_override(provider, resource).unwrap_or(default))
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Probe until `judge` returns [`Verdict::Ready`].
    ///
    /// A probe returning `Ok(None)` or an external not-found error means the
    /// resource is not visible yet and counts as pending. Any other probe
    /// error is returned as is.
    pub async fn wait_until<S, F, Fut, J>(&self, resource: &str, mut probe: F, judge: J) -> Result<S>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<S>>>,
        J: Fn(&S) -> Verdict,
    {
        for attempt in 1..=self.max_attempts {
            self.check_cancelled(resource)?;

            match probe().await {
                Ok(Some(observed)) => match judge(&observed) {
                    Verdict::Ready => {
                        tracing::debug!("{} converged after {} attempt(s)", resource, attempt);
                        return Ok(observed);
                    }
                    Verdict::Failed(status) => {
                        tracing::warn!("{} reached terminal state {}", resource, status);
                        return Err(ResourceError::ConvergenceFailure {
                            resource: resource.to_string(),
                            status,
                        });
                    }
                    Verdict::Pending => {}
                },
                Ok(None) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }

            if attempt < self.max_attempts {
                tracing::debug!(
                    "{} not ready (attempt {}/{}), retrying in {:?}",
                    resource,
                    attempt,
                    self.max_attempts,
                    self.interval
                );
                self.pause(resource).await?;
            }
        }

        Err(ResourceError::ConvergenceTimeout {
            resource: resource.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Probe until the resource disappears. Not-found is success here.
    pub async fn wait_until_gone<S, F, Fut>(&self, resource: &str, mut probe: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<S>>>,
    {
        for attempt in 1..=self.max_attempts {
            self.check_cancelled(resource)?;

            match probe().await {
                Ok(None) => return Ok(()),
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => return Err(e),
                Ok(Some(_)) => {}
            }

            if attempt < self.max_attempts {
                tracing::debug!(
                    "{} still present (attempt {}/{})",
                    resource,
                    attempt,
                    self.max_attempts
                );
                self.pause(resource).await?;
            }
        }

        Err(ResourceError::ConvergenceTimeout {
            resource: resource.to_string(),
            attempts: self.max_attempts,
        })
    }

    fn check_cancelled(&self, resource: &str) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(ResourceError::Cancelled {
                resource: resource.to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn pause(&self, resource: &str) -> Result<()> {
        match &self.cancel {
            Some(token) => tokio::select! {
                _ = tokio::time::sleep(self.interval) => Ok(()),
                _ = token.cancelled() => Err(ResourceError::Cancelled {
                    resource: resource.to_string(),
                }),
            },
            None => {
                tokio::time::sleep(self.interval).await;
                Ok(())
            }
        }
    }
}

// ── Cooperative query deadline ──
//
// Graph searches are synchronous CPU work, so a `tokio::time::timeout`
// around them cannot preempt anything. Searches poll a `Deadline`
// between node expansions instead.

use std::time::{Duration, Instant};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    /// A deadline that never expires.
    pub fn none() -> Self {
        Self {
            expires_at: None,
            budget: Duration::ZERO,
        }
    }

    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(budget),
            budget,
        }
    }

    pub fn from_timeout(timeout: Option<Duration>) -> Self {
        timeout.map_or_else(Self::none, Self::after)
    }

    pub fn check(&self) -> Result<(), CoreError> {
        match self.expires_at {
            Some(at) if Instant::now() >= at => Err(CoreError::Timeout {
                timeout_ms: u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX),
            }),
            _ => Ok(()),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_expires() {
        assert!(Deadline::none().check().is_ok());
        assert!(Deadline::from_timeout(None).check().is_ok());
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let err = Deadline::after(Duration::ZERO).check().unwrap_err();
        assert!(matches!(err, CoreError::Timeout { timeout_ms: 0 }));
    }
}

use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    BetweenPages,
    AfterFailure { attempt: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub page_delay: Duration,
    pub retry_delay: Duration,
}

impl PacingPolicy {
    pub fn delay_for(&self, pause: Pause) -> Duration {
        match pause {
            Pause::BetweenPages => self.page_delay,
            Pause::AfterFailure { .. } => self.retry_delay,
        }
    }
}

/// Governs when the next listing request may be issued.
#[async_trait]
pub trait Pacer {
    async fn pause(&self, pause: Pause);
}

/// Sleeps on the tokio timer for the policy's delay.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelayPacer {
    policy: PacingPolicy,
}

impl FixedDelayPacer {
    pub fn new(policy: PacingPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PacingPolicy {
        self.policy
    }
}

#[async_trait]
impl Pacer for FixedDelayPacer {
    async fn pause(&self, pause: Pause) {
        let delay = self.policy.delay_for(pause);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

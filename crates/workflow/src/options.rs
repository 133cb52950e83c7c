//! Per-process tuning.

use std::time::Duration;

use activities::RetryPolicy;
use cart::ProductPolicy;

/// Options shared by every process a runtime hosts.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Time from the first item landing in an empty cart to the abandonment
    /// notice.
    pub abandonment_timeout: Duration,

    /// Retry and total-timeout policy for the payment charge.
    pub charge_retry: RetryPolicy,

    pub product_policy: ProductPolicy,

    /// Capacity of each process's signal inbox.
    pub inbox_capacity: usize,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            abandonment_timeout: Duration::from_secs(10 * 60),
            charge_retry: RetryPolicy::default(),
            product_policy: ProductPolicy::default(),
            inbox_capacity: 64,
        }
    }
}

impl ProcessOptions {
    pub fn with_abandonment_timeout(mut self, timeout: Duration) -> Self {
        self.abandonment_timeout = timeout;
        self
    }

    pub fn with_charge_timeout(mut self, timeout: Duration) -> Self {
        self.charge_retry = self.charge_retry.with_total_timeout(timeout);
        self
    }

    pub fn with_charge_retry(mut self, policy: RetryPolicy) -> Self {
        self.charge_retry = policy;
        self
    }

    pub fn with_product_policy(mut self, policy: ProductPolicy) -> Self {
        self.product_policy = policy;
        self
    }
}

// src/config.rs

use chrono::Duration;

use crate::txn::RetryPolicy;

/// How `Reserve` decides whether a user can afford a reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceRule {
    /// `balance - reserved >= points`; open reservations count against the user.
    Available,
    /// `balance >= points`; several open reservations may together exceed the balance.
    Raw,
}

#[derive(Debug, Clone)]
pub struct RedemptionConfig {
    /// How long a reservation stays claimable. Fixed at 24 hours in production.
    pub reservation_ttl: Duration,
    /// Upper bound on a capability token's lifetime. `None` ties the token to
    /// the redemption's own expiry.
    pub max_token_ttl: Option<Duration>,
    pub balance_rule: BalanceRule,
    pub retry: RetryPolicy,
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            reservation_ttl: Duration::hours(24),
            max_token_ttl: None,
            balance_rule: BalanceRule::Available,
            retry: RetryPolicy::default(),
        }
    }
}

//! Per-user cooldown for on-demand fact commands.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Ledger size past which expired entries are swept on the next grant.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Whole seconds left, rounded up; always at least 1.
    Denied { seconds_remaining: u64 },
}

/// One cooldown bucket per identity, shared by every fact command.
#[derive(Debug)]
pub struct RateGate {
    cooldown: Duration,
    last_granted: HashMap<String, DateTime<Utc>>,
}

impl RateGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_granted: HashMap::new(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.last_granted.len()
    }

    /// Grant and record `now` if `identity` is outside its cooldown,
    /// otherwise report how long is left.  A clock that moved backwards
    /// counts as no time elapsed.
    pub fn try_act(&mut self, identity: &str, now: DateTime<Utc>) -> Decision {
        if let Some(&last) = self.last_granted.get(identity) {
            let elapsed = (now - last).to_std().unwrap_or_default();
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                let seconds_remaining =
                    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                return Decision::Denied { seconds_remaining };
            }
        }

        if self.last_granted.len() >= PRUNE_THRESHOLD {
            self.prune_expired(now);
        }
        self.last_granted.insert(identity.to_string(), now);
        Decision::Allowed
    }

    /// Drop identities whose cooldown has fully elapsed.  They behave exactly
    /// like identities that were never seen.
    pub fn prune_expired(&mut self, now: DateTime<Utc>) {
        let cooldown = self.cooldown;
        self.last_granted.retain(|_, last| {
            (now - *last)
                .to_std()
                .map(|elapsed| elapsed < cooldown)
                .unwrap_or(true)
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-10-31T20:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn cooldown_denies_then_allows() {
        let mut gate = RateGate::new(Duration::from_secs(30));
        assert_eq!(gate.try_act("u1", t0()), Decision::Allowed);
        assert_eq!(
            gate.try_act("u1", t0() + TimeDelta::seconds(10)),
            Decision::Denied {
                seconds_remaining: 20
            }
        );
        assert_eq!(gate.try_act("u1", t0() + TimeDelta::seconds(31)), Decision::Allowed);
    }

    #[test]
    fn exactly_at_cooldown_is_allowed() {
        let mut gate = RateGate::new(Duration::from_secs(30));
        gate.try_act("u1", t0());
        assert_eq!(gate.try_act("u1", t0() + TimeDelta::seconds(30)), Decision::Allowed);
    }

    #[test]
    fn remaining_seconds_round_up() {
        let mut gate = RateGate::new(Duration::from_secs(30));
        gate.try_act("u1", t0());
        assert_eq!(
            gate.try_act("u1", t0() + TimeDelta::milliseconds(29_500)),
            Decision::Denied {
                seconds_remaining: 1
            }
        );
        assert_eq!(
            gate.try_act("u1", t0() + TimeDelta::milliseconds(100)),
            Decision::Denied {
                seconds_remaining: 30
            }
        );
    }

    #[test]
    fn denial_does_not_reset_the_clock() {
        let mut gate = RateGate::new(Duration::from_secs(30));
        gate.try_act("u1", t0());
        gate.try_act("u1", t0() + TimeDelta::seconds(20));
        assert_eq!(gate.try_act("u1", t0() + TimeDelta::seconds(30)), Decision::Allowed);
    }

    #[test]
    fn identities_are_independent() {
        let mut gate = RateGate::new(Duration::from_secs(30));
        assert_eq!(gate.try_act("u1", t0()), Decision::Allowed);
        assert_eq!(gate.try_act("u2", t0()), Decision::Allowed);
        assert_eq!(gate.tracked(), 2);
    }

    #[test]
    fn clock_going_backwards_counts_as_no_time_elapsed() {
        let mut gate = RateGate::new(Duration::from_secs(30));
        gate.try_act("u1", t0());
        assert_eq!(
            gate.try_act("u1", t0() - TimeDelta::seconds(5)),
            Decision::Denied {
                seconds_remaining: 30
            }
        );
    }

    #[test]
    fn zero_cooldown_always_allows() {
        let mut gate = RateGate::new(Duration::ZERO);
        assert_eq!(gate.try_act("u1", t0()), Decision::Allowed);
        assert_eq!(gate.try_act("u1", t0()), Decision::Allowed);
    }

    #[test]
    fn prune_keeps_only_active_cooldowns() {
        let mut gate = RateGate::new(Duration::from_secs(30));
        gate.try_act("old", t0());
        gate.try_act("fresh", t0() + TimeDelta::seconds(25));
        gate.prune_expired(t0() + TimeDelta::seconds(40));
        assert_eq!(gate.tracked(), 1);
        assert!(matches!(
            gate.try_act("fresh", t0() + TimeDelta::seconds(40)),
            Decision::Denied { .. }
        ));
    }
}

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

use super::error::{LifecycleError, Result};
use super::traits::{Clock, IdentityResolver};
use super::types::Actor;

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Identity handed over by the transport after it authenticated the caller
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    actor: Option<Actor>,
}

impl StaticIdentity {
    pub fn new(actor: Actor) -> Self {
        Self { actor: Some(actor) }
    }

    pub fn anonymous() -> Self {
        Self { actor: None }
    }
}

impl IdentityResolver for StaticIdentity {
    fn resolve(&self) -> Result<Actor> {
        match &self.actor {
            Some(actor) if !actor.id.trim().is_empty() => Ok(actor.clone()),
            _ => Err(LifecycleError::validation("actor", "no authenticated actor")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances_only_on_request() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(15));
        assert_eq!(clock.now(), start + Duration::minutes(15));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_static_identity() {
        let resolver = StaticIdentity::new(Actor::driver("drv-1"));
        assert_eq!(resolver.resolve().unwrap(), Actor::driver("drv-1"));
        assert!(StaticIdentity::anonymous().resolve().is_err());
        assert!(StaticIdentity::new(Actor::admin("  ")).resolve().is_err());
    }
}

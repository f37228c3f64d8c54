//! External collaborators the engine consumes as opaque calls.

use crate::error::{ReconciliationError, Result};
use crate::schema::{PayerId, StudioId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps the caller of a write request to the payer stamped on settlements.
pub trait PayerResolver: Send + Sync {
    fn resolve_payer(&self, studio: StudioId, caller: &str) -> Result<PayerId>;
}

/// Resolver backed by a fixed caller table; unknown callers are `NotFound`.
#[derive(Debug, Default)]
pub struct StaticPayerResolver {
    payers: RwLock<HashMap<(StudioId, String), PayerId>>,
}

impl StaticPayerResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_payer(self, studio: StudioId, caller: impl Into<String>, payer: PayerId) -> Self {
        self.payers.write().insert((studio, caller.into()), payer);
        self
    }
}

impl PayerResolver for StaticPayerResolver {
    fn resolve_payer(&self, studio: StudioId, caller: &str) -> Result<PayerId> {
        self.payers
            .read()
            .get(&(studio, caller.to_string()))
            .copied()
            .ok_or_else(|| ReconciliationError::not_found("payer", caller))
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, movable by hand.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

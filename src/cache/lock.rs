//! Poison-tolerant access to the cache state lock.
//!
//! A poisoned lock is logged, un-poisoned and then used as usual.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

pub(crate) trait RwLockExt<T> {
    fn read_or_recover(&self, op: &'static str) -> RwLockReadGuard<'_, T>;
    fn write_or_recover(&self, op: &'static str) -> RwLockWriteGuard<'_, T>;
}

impl<T> RwLockExt<T> for RwLock<T> {
    fn read_or_recover(&self, op: &'static str) -> RwLockReadGuard<'_, T> {
        self.read().unwrap_or_else(|poisoned| {
            report_poison(op, "read");
            self.clear_poison();
            poisoned.into_inner()
        })
    }

    fn write_or_recover(&self, op: &'static str) -> RwLockWriteGuard<'_, T> {
        self.write().unwrap_or_else(|poisoned| {
            report_poison(op, "write");
            self.clear_poison();
            poisoned.into_inner()
        })
    }
}

fn report_poison(op: &'static str, access: &'static str) {
    warn!(
        op,
        access,
        target_module = "cache::store",
        result = "poisoned_recovered",
        "Recovered from poisoned tag cache lock"
    );
}

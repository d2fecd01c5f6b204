//! Two-way binding between the active step and a location store

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{fragment_for, resolve_fragment, LocationListener, LocationStore, Subscription};
use crate::registry::StepRegistry;
use crate::sync::lock;

/// Keeps one location store and one wizard's active step consistent.
///
/// Local changes are pushed with [`LocationSync::publish`]; external changes
/// arrive through the listener passed to [`LocationSync::attach`]. Publishing
/// a value the store already holds is skipped, which is what breaks the
/// write → notify → navigate → write cycle.
pub struct LocationSync {
    store: Arc<dyn LocationStore>,
    enabled: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

impl LocationSync {
    pub fn new(store: Arc<dyn LocationStore>, enabled: bool) -> Self {
        Self {
            store,
            enabled: AtomicBool::new(enabled),
            subscription: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn is_attached(&self) -> bool {
        lock(&self.subscription).is_some()
    }

    pub fn store(&self) -> &Arc<dyn LocationStore> {
        &self.store
    }

    /// Position named by the current location value, when sync is enabled
    pub fn initial_position(&self, registry: &StepRegistry) -> Option<usize> {
        if !self.is_enabled() {
            return None;
        }
        let value = self.store.read();
        let position = resolve_fragment(registry, &value);
        tracing::debug!(location = %value, ?position, "Resolved initial location");
        position
    }

    /// Write the key of `position` into the store.
    ///
    /// No-op when sync is disabled, when `position` has no registry entry, or
    /// when the store already holds the value. Returns whether a write happened.
    pub fn publish(&self, registry: &StepRegistry, position: usize) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let Some(key) = registry.key_of(position) else {
            return false;
        };

        let value = fragment_for(key);
        if self.store.read() == value {
            return false;
        }
        tracing::debug!(location = %value, position, "Publishing location");
        self.store.write(&value);
        true
    }

    /// Subscribe `listener` to external changes. Replaces any previous
    /// subscription; does nothing while sync is disabled.
    pub fn attach(&self, listener: LocationListener) {
        if !self.is_enabled() {
            return;
        }
        let subscription = self.store.subscribe(listener);
        let previous = lock(&self.subscription).replace(subscription);
        // Released outside the lock: the store may call back into us
        drop(previous);
    }

    /// Drop the current subscription, if any
    pub fn detach(&self) {
        let previous = lock(&self.subscription).take();
        drop(previous);
    }

    /// Turn syncing on or off. Disabling always detaches.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.detach();
        }
    }
}

impl Drop for LocationSync {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for LocationSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationSync")
            .field("enabled", &self.is_enabled())
            .field("attached", &self.is_attached())
            .finish_non_exhaustive()
    }
}

//! In-memory location store

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use super::{LocationListener, LocationStore, Subscription};
use crate::sync::lock;

/// Number of past values kept by [`MemoryLocation::history`]
pub const HISTORY_LIMIT: usize = 64;

#[derive(Default)]
struct Inner {
    value: String,
    listeners: Vec<(u64, LocationListener)>,
    next_id: u64,
    history: VecDeque<String>,
}

/// Location store backed by a shared in-memory string.
///
/// Clones share the same backing value and listeners. Listeners fire only
/// when the value actually changes, mirroring a browser `hashchange` event:
/// writing the current value again is a no-op.
#[derive(Clone, Default)]
pub struct MemoryLocation {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLocation {
    pub fn new(initial: impl Into<String>) -> Self {
        let value = initial.into();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                history: VecDeque::from([value.clone()]),
                value,
                ..Inner::default()
            })),
        }
    }

    /// Simulate an out-of-band change such as back/forward navigation or a
    /// hand-edited URL. Returns whether the value changed.
    pub fn set_external(&self, value: &str) -> bool {
        self.replace(value)
    }

    /// The last [`HISTORY_LIMIT`] distinct values the store has held, oldest
    /// first
    pub fn history(&self) -> Vec<String> {
        lock(&self.inner).history.iter().cloned().collect()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner).listeners.len()
    }

    fn replace(&self, value: &str) -> bool {
        let listeners: Vec<LocationListener> = {
            let mut inner = lock(&self.inner);
            if inner.value == value {
                return false;
            }
            inner.value = value.to_string();
            if inner.history.len() == HISTORY_LIMIT {
                inner.history.pop_front();
            }
            inner.history.push_back(value.to_string());
            inner.listeners.iter().map(|(_, l)| l.clone()).collect()
        };

        // Listeners may write back into the store, so they run unlocked
        for listener in listeners {
            listener(value);
        }
        true
    }

    fn remove_listener(inner: &Weak<Mutex<Inner>>, id: u64) {
        if let Some(inner) = inner.upgrade() {
            lock(&inner).listeners.retain(|(listener_id, _)| *listener_id != id);
        }
    }
}

impl LocationStore for MemoryLocation {
    fn read(&self) -> String {
        lock(&self.inner).value.clone()
    }

    fn write(&self, value: &str) {
        self.replace(value);
    }

    fn subscribe(&self, listener: LocationListener) -> Subscription {
        let id = {
            let mut inner = lock(&self.inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, listener));
            id
        };

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || Self::remove_listener(&weak, id))
    }
}

impl std::fmt::Debug for MemoryLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("MemoryLocation")
            .field("value", &inner.value)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

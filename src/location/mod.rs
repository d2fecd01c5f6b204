//! External location store
//!
//! A location store is the shared, globally mutable string (for example a
//! browser URL fragment) that mirrors the active step. The wizard only talks to
//! it through [`LocationStore`], so hosts can plug in any backing and tests can
//! use [`MemoryLocation`].

use std::sync::Arc;

use url::Url;

use crate::registry::StepRegistry;

mod binding;
mod memory;

pub use binding::LocationSync;
pub use memory::MemoryLocation;

/// Callback invoked with the new location value after an external change
pub type LocationListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Read/write/observe access to the location fragment
pub trait LocationStore: Send + Sync {
    /// Current location value (including the leading `#`, if any)
    fn read(&self) -> String;

    /// Replace the location value
    fn write(&self, value: &str);

    /// Register a change listener; dropping the returned guard unsubscribes
    fn subscribe(&self, listener: LocationListener) -> Subscription;
}

/// Guard for a location listener registration.
///
/// The listener is removed when the guard is dropped or when
/// [`Subscription::unsubscribe`] is called, whichever happens first.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Subscription with nothing to release (for stores without notifications)
    pub fn detached() -> Self {
        Self { release: None }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

const FRAGMENT_BASE: &str = "about:blank";

/// Percent-encode a step key with the URL fragment encode set
pub fn encode_key(key: &str) -> String {
    match Url::parse(FRAGMENT_BASE) {
        Ok(mut url) => {
            url.set_fragment(Some(key));
            url.fragment().unwrap_or(key).to_string()
        }
        Err(_) => key.to_string(),
    }
}

/// Location value written for a step key (`#` + encoded key)
pub fn fragment_for(key: &str) -> String {
    format!("#{}", encode_key(key))
}

/// Resolve a location value to a step position.
///
/// Accepts the value with or without its leading `#`, and matches against
/// both the raw and the percent-encoded form of each key. Empty values and
/// unknown keys resolve to `None`.
pub fn resolve_fragment(registry: &StepRegistry, value: &str) -> Option<usize> {
    let fragment = value.strip_prefix('#').unwrap_or(value);
    if fragment.is_empty() {
        return None;
    }

    registry.position_of(fragment).or_else(|| {
        // Reverse scan keeps last-wins semantics for duplicate keys
        registry
            .entries()
            .iter()
            .rev()
            .find(|entry| encode_key(&entry.key) == fragment)
            .map(|entry| entry.position)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> StepRegistry {
        StepRegistry::from_keys([Some("intro"), Some("details"), Some("done")])
    }

    #[test]
    fn test_fragment_for_plain_key() {
        assert_eq!(fragment_for("details"), "#details");
    }

    #[test]
    fn test_fragment_for_encodes_spaces() {
        assert_eq!(fragment_for("billing info"), "#billing%20info");
    }

    #[test]
    fn test_resolve_with_and_without_hash() {
        let registry = registry();
        assert_eq!(resolve_fragment(&registry, "#details"), Some(1));
        assert_eq!(resolve_fragment(&registry, "done"), Some(2));
    }

    #[test]
    fn test_resolve_unknown_and_empty() {
        let registry = registry();
        assert_eq!(resolve_fragment(&registry, "#nope"), None);
        assert_eq!(resolve_fragment(&registry, "#"), None);
        assert_eq!(resolve_fragment(&registry, ""), None);
    }

    #[test]
    fn test_resolve_encoded_key() {
        let registry = StepRegistry::from_keys([Some("start"), Some("billing info")]);
        assert_eq!(resolve_fragment(&registry, "#billing%20info"), Some(1));
        assert_eq!(resolve_fragment(&registry, "#billing info"), Some(1));
    }

    #[test]
    fn test_subscription_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(subscription.is_active());
        subscription.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let counter = released.clone();
            let _subscription = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detached_subscription() {
        let subscription = Subscription::detached();
        assert!(!subscription.is_active());
    }
}

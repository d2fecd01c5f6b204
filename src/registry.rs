//! Position/key registry derived from the step sequence
//!
//! The registry is rebuilt from scratch every time the step sequence changes;
//! inserting or removing a step shifts every position after it.

use std::collections::HashMap;

use crate::step::Step;

/// One registry row: a step position and the key it is addressed by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub position: usize,
    pub key: String,
}

/// Mapping between step positions and step keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepRegistry {
    entries: Vec<RegistryEntry>,
    positions: HashMap<String, usize>,
    duplicates: Vec<String>,
}

impl StepRegistry {
    /// Build the registry for a step sequence
    pub fn from_steps<C>(steps: &[Step<C>]) -> Self {
        Self::from_keys(steps.iter().map(Step::key))
    }

    /// Build the registry from declared keys in step order.
    ///
    /// `None` (or an empty key) falls back to [`StepRegistry::default_key`].
    /// When two steps share a key the later one wins the reverse lookup and
    /// the key is recorded in [`StepRegistry::duplicates`].
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let mut registry = Self::default();

        for (position, declared) in keys.into_iter().enumerate() {
            let key = match declared {
                Some(key) if !key.as_ref().is_empty() => key.as_ref().to_string(),
                _ => Self::default_key(position),
            };

            if registry.positions.insert(key.clone(), position).is_some()
                && !registry.duplicates.contains(&key)
            {
                registry.duplicates.push(key.clone());
            }
            registry.entries.push(RegistryEntry { position, key });
        }

        registry
    }

    /// Key used for a step that does not declare one (`step1`, `step2`, ...)
    pub fn default_key(position: usize) -> String {
        format!("step{}", position + 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Key of the step at `position`
    pub fn key_of(&self, position: usize) -> Option<&str> {
        self.entries.get(position).map(|entry| entry.key.as_str())
    }

    /// Position registered for `key` (last step wins on duplicates)
    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Keys declared by more than one step
    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_uses_declared_keys() {
        let steps = vec![
            Step::keyed("intro", ()),
            Step::keyed("details", ()),
            Step::keyed("done", ()),
        ];
        let registry = StepRegistry::from_steps(&steps);

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.key_of(1), Some("details"));
        assert_eq!(registry.position_of("done"), Some(2));
        assert!(registry.duplicates().is_empty());
    }

    #[test]
    fn test_registry_default_keys_are_one_based() {
        let steps = vec![Step::new(()), Step::keyed("custom", ()), Step::new(())];
        let registry = StepRegistry::from_steps(&steps);

        assert_eq!(registry.key_of(0), Some("step1"));
        assert_eq!(registry.key_of(1), Some("custom"));
        assert_eq!(registry.key_of(2), Some("step3"));
        assert_eq!(registry.position_of("step3"), Some(2));
    }

    #[test]
    fn test_registry_positions_are_contiguous() {
        let registry = StepRegistry::from_keys([None::<&str>, None, None, None]);
        let positions: Vec<usize> = registry.entries().iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_registry_empty() {
        let registry = StepRegistry::from_steps::<()>(&[]);
        assert!(registry.is_empty());
        assert_eq!(registry.key_of(0), None);
        assert_eq!(registry.position_of("step1"), None);
    }

    #[test]
    fn test_registry_duplicate_keys_last_wins() {
        let registry = StepRegistry::from_keys([Some("a"), Some("b"), Some("a"), Some("a")]);

        assert_eq!(registry.position_of("a"), Some(3));
        assert_eq!(registry.key_of(0), Some("a"));
        assert_eq!(registry.duplicates(), &["a".to_string()]);
    }

    #[test]
    fn test_registry_declared_key_can_shadow_default() {
        // Step 2 declares "step1", colliding with step 1's default key
        let registry = StepRegistry::from_keys([None, Some("step1")]);
        assert_eq!(registry.position_of("step1"), Some(1));
        assert_eq!(registry.duplicates(), &["step1".to_string()]);
    }
}

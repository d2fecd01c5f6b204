//! Step content handles

/// One unit of wizard content.
///
/// The content is opaque to the controller; only the position in the step
/// sequence and the optional key matter for navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step<C> {
    content: C,
    key: Option<String>,
}

impl<C> Step<C> {
    /// Create a step without a key (it will be addressed as `step{n}`)
    pub fn new(content: C) -> Self {
        Self { content, key: None }
    }

    /// Create a step addressed by `key` in the location fragment
    pub fn keyed(key: impl Into<String>, content: C) -> Self {
        Self {
            content,
            key: Some(key.into()),
        }
    }

    /// Set or replace the step key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut C {
        &mut self.content
    }

    pub fn into_content(self) -> C {
        self.content
    }

    /// Declared key, if any. Empty keys count as undeclared.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref().filter(|key| !key.is_empty())
    }
}

impl<C> From<C> for Step<C> {
    fn from(content: C) -> Self {
        Self::new(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_without_key() {
        let step = Step::new("intro");
        assert_eq!(step.key(), None);
        assert_eq!(*step.content(), "intro");
    }

    #[test]
    fn test_step_keyed() {
        let step = Step::keyed("details", 42);
        assert_eq!(step.key(), Some("details"));
        assert_eq!(step.into_content(), 42);
    }

    #[test]
    fn test_empty_key_is_undeclared() {
        let step = Step::new(()).with_key("");
        assert_eq!(step.key(), None);
    }
}

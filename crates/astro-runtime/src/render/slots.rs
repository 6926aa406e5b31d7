//! Named slots passed to a component.

use std::fmt;
use std::sync::Arc;

use super::template::TemplateResult;

type SlotFn = dyn Fn() -> TemplateResult + Send + Sync;

/// Slot name to a thunk producing its content. Each render of a slot calls
/// the thunk again.
#[derive(Clone, Default)]
pub struct Slots(Vec<(String, Arc<SlotFn>)>);

impl Slots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace slot `name`.
    pub fn with<F>(mut self, name: impl Into<String>, slot: F) -> Self
    where
        F: Fn() -> TemplateResult + Send + Sync + 'static,
    {
        self.insert(name, slot);
        self
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, slot: F)
    where
        F: Fn() -> TemplateResult + Send + Sync + 'static,
    {
        let name = name.into();
        let slot: Arc<SlotFn> = Arc::new(slot);
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = slot,
            None => self.0.push((name, slot)),
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.0.iter().any(|(n, _)| n == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Content of slot `name`; a missing slot renders nothing.
    pub fn render(&self, name: &str) -> TemplateResult {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| slot())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Slots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

//! registry::shared
//!
//! A registry shared between threads.
//!
//! Every operation takes one exclusive lock for its whole duration, so
//! `load`, `set`, `regenerate_dependents` and `set_and_regenerate` each
//! run as a single critical section.

use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    LoadSummary, RegenerationReport, RegistryError, SetOutcome, TokenDefinition, TokenRegistry,
    TokenUpdate,
};
use crate::core::types::TokenName;

/// Thread-safe handle to a [`TokenRegistry`]. Clones share the registry.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use rafters_tokens::color::mock::MockColorMath;
/// use rafters_tokens::core::types::{Category, TokenName, TokenValue};
/// use rafters_tokens::registry::{SharedRegistry, TokenDefinition, TokenRegistry, TokenUpdate};
///
/// let shared = SharedRegistry::new(TokenRegistry::new(Arc::new(MockColorMath::new())));
/// let a = TokenName::new("a").unwrap();
/// let b = TokenName::new("b").unwrap();
/// shared
///     .load(vec![
///         TokenDefinition::literal(a.clone(), Category::Spacing, 1.0),
///         TokenDefinition::computed(b.clone(), Category::Spacing, "calc(a + 1)"),
///     ])
///     .unwrap();
///
/// let writer = shared.clone();
/// let a2 = a.clone();
/// thread::spawn(move || {
///     writer
///         .set_and_regenerate(&a2, TokenUpdate::Value(TokenValue::Number(9.0)))
///         .unwrap();
/// })
/// .join()
/// .unwrap();
///
/// let b_value = shared.with(|r| r.value(&b).cloned()).unwrap();
/// assert_eq!(b_value, Some(TokenValue::Number(10.0)));
/// ```
#[derive(Debug, Clone)]
pub struct SharedRegistry {
    inner: Arc<Mutex<TokenRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: TokenRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, TokenRegistry>, RegistryError> {
        self.inner.lock().map_err(|_| RegistryError::Poisoned)
    }

    /// Run `f` with shared access to the registry.
    pub fn with<R>(&self, f: impl FnOnce(&TokenRegistry) -> R) -> Result<R, RegistryError> {
        let guard = self.lock()?;
        Ok(f(&guard))
    }

    /// Run `f` with exclusive access to the registry.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut TokenRegistry) -> R) -> Result<R, RegistryError> {
        let mut guard = self.lock()?;
        Ok(f(&mut guard))
    }

    pub fn load(&self, defs: Vec<TokenDefinition>) -> Result<LoadSummary, RegistryError> {
        Ok(self.lock()?.load(defs)?)
    }

    pub fn set(&self, name: &TokenName, update: TokenUpdate) -> Result<SetOutcome, RegistryError> {
        Ok(self.lock()?.set(name, update)?)
    }

    pub fn regenerate_dependents(&self, changed: &TokenName) -> Result<RegenerationReport, RegistryError> {
        self.lock()?.regenerate_dependents(changed)
    }

    /// `set` followed by `regenerate_dependents`, under one lock.
    pub fn set_and_regenerate(
        &self,
        name: &TokenName,
        update: TokenUpdate,
    ) -> Result<(SetOutcome, RegenerationReport), RegistryError> {
        let mut registry = self.lock()?;
        let outcome = registry.set(name, update)?;
        let report = registry.regenerate_dependents(name)?;
        Ok((outcome, report))
    }

    /// Take the registry back if this is the last handle.
    pub fn into_inner(self) -> Result<TokenRegistry, Self> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex
                .into_inner()
                .map_err(|poisoned| Self::new(poisoned.into_inner())),
            Err(inner) => Err(Self { inner }),
        }
    }
}

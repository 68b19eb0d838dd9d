//! At most one live chart context per registry
//!
//! A context claims its registry when the host completes the handshake and
//! releases it on destroy. Construction is refused while the registry is
//! claimed. Tests create their own registry instead of sharing the
//! thread-wide one.

use chart_sdk_shared::{ChartSdkError, SdkResult};
use std::cell::Cell;
use std::rc::Rc;
use uuid::Uuid;

thread_local! {
    static GLOBAL_REGISTRY: ContextRegistry = ContextRegistry::new();
}

#[derive(Clone, Default)]
pub struct ContextRegistry {
    owner: Rc<Cell<Option<Uuid>>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every context on this thread
    pub fn global() -> Self {
        GLOBAL_REGISTRY.with(Clone::clone)
    }

    pub fn is_claimed(&self) -> bool {
        self.owner.get().is_some()
    }

    pub fn owner(&self) -> Option<Uuid> {
        self.owner.get()
    }

    /// Claim the registry for `instance`; claiming it again is a no-op
    pub fn try_acquire(&self, instance: Uuid) -> SdkResult<()> {
        match self.owner.get() {
            Some(owner) if owner != instance => Err(ChartSdkError::MultipleContextsNotSupported),
            _ => {
                self.owner.set(Some(instance));
                Ok(())
            }
        }
    }

    /// Release the claim if `instance` holds it
    pub fn release(&self, instance: Uuid) {
        if self.owner.get() == Some(instance) {
            self.owner.set(None);
        }
    }

    /// Refuse a new context while another one holds the claim
    pub fn ensure_available(&self) -> SdkResult<()> {
        if self.is_claimed() {
            return Err(ChartSdkError::MultipleContextsNotSupported);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_cycle() {
        let registry = ContextRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(registry.ensure_available().is_ok());
        registry.try_acquire(first).unwrap();
        registry.try_acquire(first).unwrap();
        assert_eq!(
            registry.try_acquire(second),
            Err(ChartSdkError::MultipleContextsNotSupported)
        );
        assert_eq!(
            registry.ensure_available(),
            Err(ChartSdkError::MultipleContextsNotSupported)
        );

        registry.release(second);
        assert_eq!(registry.owner(), Some(first));
        registry.release(first);
        assert!(!registry.is_claimed());
        registry.try_acquire(second).unwrap();
    }

    #[test]
    fn test_registries_are_isolated() {
        let a = ContextRegistry::new();
        let b = ContextRegistry::new();
        a.try_acquire(Uuid::new_v4()).unwrap();
        assert!(!b.is_claimed());
    }

    #[test]
    fn test_global_is_shared_per_thread() {
        let instance = Uuid::new_v4();
        ContextRegistry::global().try_acquire(instance).unwrap();
        assert_eq!(ContextRegistry::global().owner(), Some(instance));
        ContextRegistry::global().release(instance);
    }
}

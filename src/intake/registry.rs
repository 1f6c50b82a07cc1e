//! In-flight ticket registry
//!
//! A key is present from the moment an attempt starts until that attempt
//! terminates. Release is tied to `InFlightPermit::drop`, so it happens on
//! every exit path including panics.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

/// Shared set of ticket keys currently being processed
#[derive(Clone, Default)]
pub struct ProcessingRegistry {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl ProcessingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking holder cannot leave the set unusable
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Atomically claim `key`; `None` if an attempt is already in flight
    pub fn try_acquire(&self, key: &str) -> Option<InFlightPermit> {
        if !self.lock().insert(key.to_string()) {
            return None;
        }
        debug!("Registered {} as in flight", key);
        Some(InFlightPermit {
            key: key.to_string(),
            registry: self.clone(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Keys in flight, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().iter().cloned().collect();
        keys.sort();
        keys
    }

    fn release(&self, key: &str) {
        self.lock().remove(key);
        debug!("Released {}", key);
    }
}

impl fmt::Debug for ProcessingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingRegistry").field("keys", &self.keys()).finish()
    }
}

/// Proof that this attempt owns its ticket key; dropping it releases the key
pub struct InFlightPermit {
    key: String,
    registry: ProcessingRegistry,
}

impl InFlightPermit {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

impl fmt::Debug for InFlightPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightPermit").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let registry = ProcessingRegistry::new();
        let permit = registry.try_acquire("REP-1").unwrap();
        assert!(registry.try_acquire("REP-1").is_none());
        assert!(registry.contains("REP-1"));
        assert_eq!(permit.key(), "REP-1");
    }

    #[test]
    fn test_drop_releases() {
        let registry = ProcessingRegistry::new();
        {
            let _permit = registry.try_acquire("REP-1").unwrap();
            assert_eq!(registry.len(), 1);
        }
        assert!(registry.is_empty());
        assert!(registry.try_acquire("REP-1").is_some());
    }

    #[test]
    fn test_independent_keys() {
        let registry = ProcessingRegistry::new();
        let _a = registry.try_acquire("REP-2").unwrap();
        let _b = registry.try_acquire("REP-1").unwrap();
        assert_eq!(registry.keys(), vec!["REP-1", "REP-2"]);
    }

    #[test]
    fn test_release_on_panic() {
        let registry = ProcessingRegistry::new();
        let clone = registry.clone();

        let outcome = std::panic::catch_unwind(move || {
            let _permit = clone.try_acquire("REP-9").unwrap();
            panic!("run crashed");
        });

        assert!(outcome.is_err());
        assert!(!registry.contains("REP-9"));
    }

    #[tokio::test]
    async fn test_concurrent_acquire_has_one_winner() {
        let registry = ProcessingRegistry::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.try_acquire("REP-5").map(|p| {
                    std::mem::forget(p);
                })
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}

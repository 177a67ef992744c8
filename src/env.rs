//! Environment stores and a scoped overlay over them.
//!
//! Every operation in this crate reads its inputs through an [`EnvStore`]
//! instead of `std::env`, so callers can hand in the real process
//! environment ([`ProcessEnv`]) or any in-memory map.

use std::collections::{BTreeMap, HashMap};
use std::env;
use std::ffi::OsString;

/// Key/value store the proxy settings are read from and applied to
pub trait EnvStore {
    /// Full copy of the store, as captured by [`EnvStore::snapshot`]
    type Snapshot;

    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str);

    fn remove(&mut self, key: &str);

    fn snapshot(&self) -> Self::Snapshot;

    /// Put the store back to exactly `snapshot`, dropping keys it lacks
    fn restore(&mut self, snapshot: Self::Snapshot);

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// The process environment
///
/// Mutating it is process-wide; overlapping overlays from several threads
/// will clobber each other's snapshots
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnv;

impl EnvStore for ProcessEnv {
    // Raw OS strings so non UTF-8 variables survive a restore.
    type Snapshot = BTreeMap<OsString, OsString>;

    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }

    fn set(&mut self, key: &str, value: &str) {
        env::set_var(key, value);
    }

    fn remove(&mut self, key: &str) {
        env::remove_var(key);
    }

    fn snapshot(&self) -> Self::Snapshot {
        env::vars_os().collect()
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        let current = self.snapshot();
        for key in current.keys() {
            if !snapshot.contains_key(key) {
                env::remove_var(key);
            }
        }
        for (key, value) in &snapshot {
            if current.get(key) != Some(value) {
                env::set_var(key, value);
            }
        }
    }
}

impl EnvStore for HashMap<String, String> {
    type Snapshot = HashMap<String, String>;

    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        HashMap::remove(self, key);
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.clone()
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        *self = snapshot;
    }
}

impl EnvStore for BTreeMap<String, String> {
    type Snapshot = BTreeMap<String, String>;

    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        BTreeMap::remove(self, key);
    }

    fn snapshot(&self) -> Self::Snapshot {
        self.clone()
    }

    fn restore(&mut self, snapshot: Self::Snapshot) {
        *self = snapshot;
    }
}

/// Writes a set of pairs into a store and puts the store back exactly as it
/// was when the overlay is dropped
///
/// Restoration is against a full snapshot taken at construction: keys that
/// appeared while the overlay was alive are removed and every pre-existing
/// key gets its original value back
pub struct EnvOverlay<'e, E: EnvStore + ?Sized> {
    env: &'e mut E,
    snapshot: Option<E::Snapshot>,
}

impl<'e, E: EnvStore + ?Sized> EnvOverlay<'e, E> {
    pub fn new<'p, I>(env: &'e mut E, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'p str, &'p str)>,
    {
        let snapshot = env.snapshot();
        let mut applied = 0usize;
        for (key, value) in pairs {
            env.set(key, value);
            applied += 1;
        }
        tracing::debug!(applied, "applied environment overlay");
        Self {
            env,
            snapshot: Some(snapshot),
        }
    }

    /// The store as currently overlaid
    pub fn env(&self) -> &E {
        &*self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut *self.env
    }
}

impl<E: EnvStore + ?Sized> Drop for EnvOverlay<'_, E> {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.env.restore(snapshot);
            tracing::debug!("restored environment after overlay");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn overlay_drops_keys_added_during_scope() {
        let mut env = store(&[("KEEP", "1")]);
        {
            let mut overlay = EnvOverlay::new(&mut env, [("NEW", "2")]);
            overlay.env_mut().set("LATE", "3");
            assert_eq!(EnvStore::get(overlay.env(), "NEW"), Some("2".to_string()));
        }
        assert_eq!(env, store(&[("KEEP", "1")]));
    }

    #[test]
    fn overlay_restores_removed_keys() {
        let mut env = store(&[("KEEP", "1"), ("GONE", "x")]);
        {
            let mut overlay = EnvOverlay::new(&mut env, [("KEEP", "override")]);
            overlay.env_mut().remove("GONE");
        }
        assert_eq!(env, store(&[("KEEP", "1"), ("GONE", "x")]));
    }
}

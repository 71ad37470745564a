//! Scoped ownership of process-wide environment variables.
//!
//! Some ecosystem tooling reads its configuration from the process
//! environment. [`EnvScope`] serialises every such use behind one lock,
//! snapshots the variables it is about to touch and restores them when the
//! guard is dropped, whether enumeration returned, failed or panicked.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

static GLOBAL_ENV: Mutex<()> = Mutex::new(());

/// Which variables a scope takes over.
#[derive(Debug, Clone, Default)]
pub struct EnvSpec {
    /// Variables whose name starts with one of these are cleared.
    pub clear_prefixes: Vec<&'static str>,
    /// Exact variable names that are cleared.
    pub clear_vars: Vec<&'static str>,
    /// Variables set for the duration of the scope.
    pub set: Vec<(String, OsString)>,
}

pub struct EnvScope {
    saved: BTreeMap<OsString, Option<OsString>>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvScope {
    /// Take the global environment lock and apply `spec`.
    pub fn acquire(spec: &EnvSpec) -> Self {
        // A panic inside another scope still restored its variables in Drop,
        // so a poisoned lock guards a consistent environment.
        let lock = GLOBAL_ENV.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut saved = BTreeMap::new();
        let cleared: Vec<OsString> = std::env::vars_os()
            .map(|(key, _)| key)
            .filter(|key| {
                let key = key.to_string_lossy();
                spec.clear_prefixes.iter().any(|p| key.starts_with(p))
                    || spec.clear_vars.iter().any(|v| key == *v)
            })
            .collect();

        for key in cleared {
            saved.insert(key.clone(), std::env::var_os(&key));
            std::env::remove_var(&key);
        }
        for (key, value) in &spec.set {
            let key = OsString::from(key);
            saved
                .entry(key.clone())
                .or_insert_with(|| std::env::var_os(&key));
            std::env::set_var(&key, value);
        }

        debug!(vars = saved.len(), "entered scoped environment");
        Self { saved, _lock: lock }
    }
}

impl Drop for EnvScope {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
        debug!(vars = self.saved.len(), "restored environment");
    }
}

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use super::{bundler, cargo, npm, pip, Source, SourceContext};
use crate::error::{ConfigError, SourceError};
use crate::models::Dependency;

type Constructor = fn() -> Box<dyn Source>;

/// Known source types in priority order, each with its constructor.
///
/// Registration order is the order sources are enabled, scanned and displayed.
pub struct Registry {
    entries: Vec<(&'static str, Constructor)>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Every ecosystem this build knows about.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(bundler::TYPE, || Box::new(bundler::BundlerSource::new()));
        registry.register(cargo::TYPE, || Box::new(cargo::CargoSource::new()));
        registry.register(npm::TYPE, || Box::new(npm::NpmSource::new()));
        registry.register(pip::TYPE, || Box::new(pip::PipSource::new()));
        registry
    }

    /// Add a source type. Re-registering a type replaces its constructor in place.
    pub fn register(&mut self, type_name: &'static str, constructor: Constructor) {
        match self.entries.iter_mut().find(|(name, _)| *name == type_name) {
            Some(entry) => entry.1 = constructor,
            None => self.entries.push((type_name, constructor)),
        }
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    /// Reject overrides that name a source type nobody registered.
    pub fn validate<'a, I>(&self, names: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        for name in names {
            if !self.entries.iter().any(|(known, _)| known == name) {
                return Err(ConfigError::Invalid(format!(
                    "unknown source type `{}` (known: {})",
                    name,
                    self.type_names().join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Instantiate, in registration order, every source that is not switched
    /// off by `overrides` and reports itself enabled for the project.
    ///
    /// An explicit `false` skips the source without calling `is_enabled`.
    /// `context_for` supplies each source's context (its group policy may differ).
    pub fn enabled_sources<F>(
        &self,
        overrides: &HashMap<String, bool>,
        context_for: F,
    ) -> Vec<SourceHandle>
    where
        F: Fn(&str) -> SourceContext,
    {
        self.entries
            .iter()
            .filter(|(name, _)| overrides.get(*name).copied().unwrap_or(true))
            .filter_map(|(name, constructor)| {
                let source = constructor();
                let ctx = context_for(*name);
                if source.is_enabled(&ctx) {
                    Some(SourceHandle::new(source, ctx))
                } else {
                    debug!(source = name, "not applicable to this project");
                    None
                }
            })
            .collect()
    }
}

/// One source instance bound to one scan.
///
/// The enumeration result is computed at most once; failures are not kept,
/// so a later call retries.
#[derive(Clone)]
pub struct SourceHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    source: Box<dyn Source>,
    ctx: SourceContext,
    dependencies: OnceLock<Vec<Dependency>>,
}

impl SourceHandle {
    pub fn new(source: Box<dyn Source>, ctx: SourceContext) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                source,
                ctx,
                dependencies: OnceLock::new(),
            }),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.source.type_name()
    }

    pub fn exclusive_global_config(&self) -> bool {
        self.inner.source.exclusive_global_config()
    }

    pub fn dependencies(&self) -> Result<&[Dependency], SourceError> {
        if let Some(deps) = self.inner.dependencies.get() {
            return Ok(deps.as_slice());
        }
        let deps = self.inner.source.list_dependencies(&self.inner.ctx)?;
        Ok(self.inner.dependencies.get_or_init(|| deps).as_slice())
    }
}

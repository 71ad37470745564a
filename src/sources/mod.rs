//! Dependency sources, one per package-manager ecosystem.
//!
//! A [`Source`] only reads graphs that the ecosystem's own tooling already
//! resolved (lockfiles, installed package metadata). Sources are registered
//! explicitly in [`registry::Registry::builtin`].

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use regex::Regex;

use crate::error::SourceError;
use crate::models::Dependency;

pub mod bundler;
pub mod cargo;
pub mod env_scope;
pub mod graph;
pub mod npm;
pub mod pip;
pub mod registry;

/// Group assigned to dependencies that are not declared in any named group.
pub const DEFAULT_GROUP: &str = "default";

/// Per-scan inputs shared by every source.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// Project root the scan runs against.
    pub root: PathBuf,
    /// Dependency groups to leave out of the enumeration.
    pub excluded_groups: BTreeSet<String>,
}

impl SourceContext {
    pub fn new<I, S>(root: impl Into<PathBuf>, excluded_groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            excluded_groups: excluded_groups.into_iter().map(Into::into).collect(),
        }
    }

    /// A dependency is kept when at least one of its groups is not excluded.
    /// No groups at all means the default group.
    pub fn includes<'a, I>(&self, groups: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut any = false;
        for group in groups {
            any = true;
            if !self.excluded_groups.contains(group) {
                return true;
            }
        }
        !any && !self.excluded_groups.contains(DEFAULT_GROUP)
    }
}

pub trait Source: Send + Sync {
    /// Stable identifier of the ecosystem, e.g. `"rubygem"`. Used as the cache
    /// directory name.
    fn type_name(&self) -> &'static str;

    /// Cheap, side-effect-free applicability check (usually "does the lockfile exist").
    fn is_enabled(&self, ctx: &SourceContext) -> bool;

    /// Enumerate the resolved production dependencies of the project.
    fn list_dependencies(&self, ctx: &SourceContext) -> Result<Vec<Dependency>, SourceError>;

    /// Whether enumeration needs the process-wide environment slot guarded by
    /// [`env_scope::EnvScope`]. Such sources run one at a time.
    fn exclusive_global_config(&self) -> bool {
        false
    }
}

/// Read a project file, mapping failures to [`SourceError::Unavailable`].
pub(crate) fn read_file(path: &std::path::Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path)
        .map_err(|e| SourceError::Unavailable(format!("cannot read {}: {}", path.display(), e)))
}

/// Compile a parser pattern, surfacing a bad pattern as a source failure.
pub(crate) fn pattern(re: &str) -> Result<Regex, SourceError> {
    Regex::new(re).map_err(|e| SourceError::Unavailable(format!("invalid pattern: {}", e)))
}

/// Enforce the `(source_type, name)` uniqueness of one enumeration.
///
/// Exact `(name, version)` repeats are collapsed. A name present with several
/// versions is renamed to `<name>-<version>` for every one of them. A collision
/// that survives renaming is a resolution error.
pub fn disambiguate(deps: Vec<Dependency>) -> Result<Vec<Dependency>, SourceError> {
    let mut seen = BTreeSet::new();
    let deps: Vec<Dependency> = deps
        .into_iter()
        .filter(|d| seen.insert((d.name.clone(), d.version.clone())))
        .collect();

    let mut versions: HashMap<&str, usize> = HashMap::new();
    for dep in &deps {
        *versions.entry(dep.name.as_str()).or_insert(0) += 1;
    }
    let ambiguous: BTreeSet<String> = versions
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(name, _)| name.to_string())
        .collect();

    let mut names = BTreeSet::new();
    let mut out = Vec::with_capacity(deps.len());
    for mut dep in deps {
        if ambiguous.contains(&dep.name) {
            dep.name = format!("{}-{}", dep.name, dep.version);
        }
        if !names.insert(dep.name.clone()) {
            return Err(SourceError::Resolution(format!(
                "dependency {} reported twice by {}",
                dep.name, dep.source_type
            )));
        }
        out.push(dep);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_includes_groups() {
        let ctx = SourceContext::new("/tmp", ["test", "development"]);
        assert!(ctx.includes(["default"]));
        assert!(ctx.includes(["test", "default"]));
        assert!(!ctx.includes(["test", "development"]));
        assert!(ctx.includes(std::iter::empty()));

        let strict = SourceContext::new("/tmp", ["default"]);
        assert!(!strict.includes(std::iter::empty()));
    }

    #[test]
    fn test_disambiguate_versions() {
        let deps = vec![
            Dependency::new("cargo", "syn", "1.0.109"),
            Dependency::new("cargo", "syn", "2.0.48"),
            Dependency::new("cargo", "serde", "1.0.150"),
            Dependency::new("cargo", "serde", "1.0.150"),
        ];
        let out = disambiguate(deps).unwrap();
        let names: Vec<_> = out.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["syn-1.0.109", "syn-2.0.48", "serde"]);
    }

    #[test]
    fn test_disambiguate_rejects_collisions() {
        let deps = vec![
            Dependency::new("npm", "a", "1"),
            Dependency::new("npm", "a", "2"),
            Dependency::new("npm", "a-1", "0"),
        ];
        assert!(matches!(
            disambiguate(deps),
            Err(SourceError::Resolution(_))
        ));
    }

    #[test]
    fn test_bad_pattern_is_a_source_failure() {
        assert!(pattern(r"^gem\s+(\w+)").is_ok());
        assert!(matches!(pattern("(unclosed"), Err(SourceError::Unavailable(_))));
    }
}

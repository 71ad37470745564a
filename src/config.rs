use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policy::LicensePolicy;
use crate::sources::registry::Registry;
use crate::sources::SourceContext;

/// Root configuration structure, deserialized from `.license-ledger/config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Cache directory, relative to the project root unless absolute.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Delete records of dependencies that disappeared instead of marking them stale.
    #[serde(default)]
    pub prune: bool,
    /// Per-source enumeration timeout in seconds.
    #[serde(default)]
    pub source_timeout: Option<u64>,
    /// Dependency groups left out of every source unless overridden in `groups`.
    #[serde(default = "default_ignored_groups")]
    pub ignored_groups: Vec<String>,
    /// Per-source enable overrides. Absent means enabled.
    #[serde(default)]
    pub sources: HashMap<String, bool>,
    /// Per-source replacement for `ignored_groups`.
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Licenses that are acceptable without review.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    /// SPDX identifiers, e.g. `"MIT"`, `"Apache-2.0"`.
    #[serde(default)]
    pub allowed: Vec<String>,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".licenses")
}

fn default_ignored_groups() -> Vec<String> {
    vec!["test".to_string(), "development".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_path: default_cache_path(),
            prune: false,
            source_timeout: None,
            ignored_groups: default_ignored_groups(),
            sources: HashMap::new(),
            groups: HashMap::new(),
            policy: PolicyConfig::default(),
        }
    }
}

impl Config {
    /// Reject source overrides that name unknown source types.
    pub fn validate(&self, registry: &Registry) -> Result<(), ConfigError> {
        registry.validate(self.sources.keys())?;
        registry.validate(self.groups.keys())?;
        if self.source_timeout == Some(0) {
            return Err(ConfigError::Invalid(
                "source_timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Restrict the scan to `only`, disabling every other registered source.
    pub fn restrict_sources(&mut self, registry: &Registry, only: &[String]) -> Result<(), ConfigError> {
        registry.validate(only)?;
        for name in registry.type_names() {
            let wanted = only.iter().any(|o| o == name);
            // An explicit `false` in the file still wins
            let entry = self.sources.entry(name.to_string()).or_insert(wanted);
            *entry = *entry && wanted;
        }
        Ok(())
    }

    pub fn source_timeout(&self) -> Option<Duration> {
        self.source_timeout.map(Duration::from_secs)
    }

    pub fn cache_root(&self, project: &Path) -> PathBuf {
        project.join(&self.cache_path)
    }

    pub fn license_policy(&self) -> LicensePolicy {
        LicensePolicy::new(&self.policy.allowed)
    }

    /// Build the enumeration context for one source type.
    pub fn source_context(&self, project: &Path, source_type: &str) -> SourceContext {
        let excluded = self
            .groups
            .get(source_type)
            .unwrap_or(&self.ignored_groups);
        SourceContext::new(project, excluded.iter().cloned())
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`: path passed via `--config`
/// 2. `<project_path>/.license-ledger/config.toml`
/// 3. `~/.config/license-ledger/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".license-ledger").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("license-ledger")
            .join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_config(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "{}", content).unwrap();
        f
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.cache_path, PathBuf::from(".licenses"));
        assert_eq!(cfg.ignored_groups, vec!["test", "development"]);
        assert!(!cfg.prune);
        assert_eq!(cfg.source_timeout(), None);
    }

    #[test]
    fn test_parse_full_config() {
        let f = write_config(
            r#"
cache_path = "vendor/licenses"
prune = true
source_timeout = 30
ignored_groups = ["test"]

[sources]
npm = false

[groups]
cargo = ["development", "build"]

[policy]
allowed = ["MIT", "Apache-2.0"]
"#,
        );
        let cfg = load_config(Path::new("/nonexistent"), Some(f.path())).unwrap();
        cfg.validate(&Registry::builtin()).unwrap();
        assert!(cfg.prune);
        assert_eq!(cfg.source_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(cfg.sources.get("npm"), Some(&false));
        assert!(cfg.license_policy().allows(Some("MIT")));

        let cargo = cfg.source_context(Path::new("/p"), "cargo");
        assert!(cargo.excluded_groups.contains("build"));
        let pip = cfg.source_context(Path::new("/p"), "pip");
        assert!(pip.excluded_groups.contains("test"));
        assert!(!pip.excluded_groups.contains("development"));
        assert_eq!(cfg.cache_root(Path::new("/p")), PathBuf::from("/p/vendor/licenses"));
    }

    #[test]
    fn test_unknown_key_is_invalid() {
        let f = write_config("prnue = true\n");
        assert!(matches!(
            load_config(Path::new("/nonexistent"), Some(f.path())),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let f = write_config("[sources]\nnpm = \"no\"\n");
        assert!(load_config(Path::new("/nonexistent"), Some(f.path())).is_err());
    }

    #[test]
    fn test_unknown_source_is_invalid() {
        let f = write_config("[sources]\ngradle = true\n");
        let cfg = load_config(Path::new("/nonexistent"), Some(f.path())).unwrap();
        assert!(cfg.validate(&Registry::builtin()).is_err());
    }

    #[test]
    fn test_project_config_is_found() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join(".license-ledger")).unwrap();
        std::fs::write(
            dir.path().join(".license-ledger").join("config.toml"),
            "prune = true\n",
        )
        .unwrap();
        assert!(load_config(dir.path(), None).unwrap().prune);
    }

    #[test]
    fn test_restrict_sources() {
        let registry = Registry::builtin();
        let mut cfg = Config::default();
        cfg.sources.insert("cargo".to_string(), false);
        cfg.restrict_sources(&registry, &["cargo".to_string(), "npm".to_string()])
            .unwrap();
        assert_eq!(cfg.sources.get("rubygem"), Some(&false));
        assert_eq!(cfg.sources.get("cargo"), Some(&false));
        assert_eq!(cfg.sources.get("npm"), Some(&true));

        assert!(cfg
            .restrict_sources(&registry, &["maven".to_string()])
            .is_err());
    }
}

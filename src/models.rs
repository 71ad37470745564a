use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Metadata keys promoted to top-level fields of a [`CachedRecord`].
pub const LICENSE_KEY: &str = "license";
pub const SUMMARY_KEY: &str = "summary";
pub const HOMEPAGE_KEY: &str = "homepage";

/// One dependency discovered by a source during a single scan.
///
/// `(source_type, name)` is unique within one enumeration of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub source_type: String,
    pub name: String,
    pub version: String,
    /// Installed location, used for license file discovery. `None` when the
    /// source cannot know where the package lives.
    pub path: Option<PathBuf>,
    pub metadata: BTreeMap<String, String>,
}

impl Dependency {
    pub fn new(source_type: &str, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            source_type: source_type.to_string(),
            name: name.into(),
            version: version.into(),
            path: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set a metadata key, ignoring empty values.
    pub fn with_meta(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.metadata.insert(key.to_string(), value);
        }
        self
    }
}

/// Content of one license or notice file found next to a dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseText {
    /// File name the text was read from.
    pub sources: String,
    pub text: String,
}

/// Persisted snapshot of a dependency, the baseline for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRecord {
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default)]
    pub licenses: Vec<LicenseText>,
    #[serde(default)]
    pub notices: Vec<LicenseText>,
    /// Metadata keys without a dedicated field.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Set by a human reviewer; cleared whenever the content changes.
    #[serde(default)]
    pub reviewed: bool,
    #[serde(default)]
    pub ignored: bool,
    /// The dependency is no longer enumerated but the record was kept.
    #[serde(default)]
    pub stale: bool,
    pub fingerprint: String,
}

impl CachedRecord {
    /// Build an unreviewed record for a freshly enumerated dependency.
    pub fn from_dependency(
        dep: &Dependency,
        licenses: Vec<LicenseText>,
        notices: Vec<LicenseText>,
        fingerprint: String,
    ) -> Self {
        let mut metadata = dep.metadata.clone();
        let license = metadata.remove(LICENSE_KEY);
        let summary = metadata.remove(SUMMARY_KEY);
        let homepage = metadata.remove(HOMEPAGE_KEY);

        Self {
            source_type: dep.source_type.clone(),
            name: dep.name.clone(),
            version: dep.version.clone(),
            license,
            summary,
            homepage,
            licenses,
            notices,
            metadata,
            reviewed: false,
            ignored: false,
            stale: false,
            fingerprint,
        }
    }

    /// Whether a human has accepted this record as it stands.
    pub fn accepted(&self) -> bool {
        self.reviewed || self.ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_promotes_known_metadata() {
        let dep = Dependency::new("rubygem", "nokogiri", "1.15.0")
            .with_meta(SUMMARY_KEY, Some("HTML parser".to_string()))
            .with_meta(LICENSE_KEY, Some("MIT".to_string()))
            .with_meta("platform", Some("x86_64-linux".to_string()))
            .with_meta(HOMEPAGE_KEY, Some("  ".to_string()));

        let record = CachedRecord::from_dependency(&dep, vec![], vec![], "abc".to_string());
        assert_eq!(record.license.as_deref(), Some("MIT"));
        assert_eq!(record.summary.as_deref(), Some("HTML parser"));
        assert_eq!(record.homepage, None);
        assert_eq!(record.metadata.len(), 1);
        assert!(!record.reviewed);
        assert!(!record.accepted());
    }

    #[test]
    fn test_record_serializes_type_key() {
        let dep = Dependency::new("cargo", "serde", "1.0.150");
        let record = CachedRecord::from_dependency(&dep, vec![], vec![], "f".to_string());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "cargo");
        assert!(json.get("metadata").is_none());
    }
}

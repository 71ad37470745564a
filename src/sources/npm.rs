use std::path::Path;

use serde_json::Value;

use super::{disambiguate, read_file, Source, SourceContext, DEFAULT_GROUP};
use crate::error::SourceError;
use crate::models::{Dependency, HOMEPAGE_KEY, LICENSE_KEY, SUMMARY_KEY};

pub const TYPE: &str = "npm";

/// Packages recorded in `package-lock.json` (lockfile v2/v3 `packages` map).
///
/// Entries flagged `dev` or `devOptional` belong to the `development` group.
pub struct NpmSource;

impl NpmSource {
    pub fn new() -> Self {
        Self
    }
}

impl Source for NpmSource {
    fn type_name(&self) -> &'static str {
        TYPE
    }

    fn is_enabled(&self, ctx: &SourceContext) -> bool {
        ctx.root.join("package-lock.json").exists()
    }

    fn list_dependencies(&self, ctx: &SourceContext) -> Result<Vec<Dependency>, SourceError> {
        let content = read_file(&ctx.root.join("package-lock.json"))?;
        let json: Value = serde_json::from_str(&content)
            .map_err(|e| SourceError::Unavailable(format!("invalid package-lock.json: {}", e)))?;

        let Some(packages) = json.get("packages").and_then(|v| v.as_object()) else {
            return Err(SourceError::Unavailable(
                "package-lock.json has no `packages` map; lockfile v1 is not supported".to_string(),
            ));
        };

        let mut deps = Vec::new();
        for (pkg_path, info) in packages {
            // Skip the root entry and workspace links
            if pkg_path.is_empty() || info.get("link").and_then(Value::as_bool) == Some(true) {
                continue;
            }
            let Some(name) = package_name(pkg_path, info) else {
                continue;
            };
            let Some(version) = info.get("version").and_then(Value::as_str) else {
                return Err(SourceError::Resolution(format!(
                    "{} has no resolved version",
                    pkg_path
                )));
            };

            let flag = |key: &str| info.get(key).and_then(Value::as_bool) == Some(true);
            let group = if flag("dev") || flag("devOptional") {
                "development"
            } else {
                DEFAULT_GROUP
            };
            if !ctx.includes([group]) {
                continue;
            }

            let install_dir = ctx.root.join(pkg_path);
            let installed = read_package_json(&install_dir.join("package.json"));
            let installed_field = |key: &str| {
                installed
                    .as_ref()
                    .and_then(|p| p.get(key))
                    .and_then(license_or_str)
            };

            let license = info
                .get("license")
                .and_then(license_or_str)
                .or_else(|| installed_field("license"));

            deps.push(
                Dependency::new(TYPE, name, version)
                    .with_path(install_dir)
                    .with_meta(LICENSE_KEY, license)
                    .with_meta(SUMMARY_KEY, installed_field("description"))
                    .with_meta(HOMEPAGE_KEY, installed_field("homepage")),
            );
        }

        disambiguate(deps)
    }
}

/// Derive the package name from its install path:
/// `node_modules/a/node_modules/@scope/b` → `@scope/b`.
fn package_name(pkg_path: &str, info: &Value) -> Option<String> {
    if let Some(name) = info.get("name").and_then(Value::as_str) {
        return Some(name.to_string());
    }
    let (_, tail) = pkg_path.rsplit_once("node_modules/")?;
    (!tail.is_empty()).then(|| tail.to_string())
}

fn read_package_json(path: &Path) -> Option<Value> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Strings as-is; legacy `{ "type": "MIT" }` license objects by their type.
fn license_or_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .or_else(|| value.get("type").and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LOCK: &str = r#"{
  "name": "my-app",
  "lockfileVersion": 3,
  "packages": {
    "": { "name": "my-app", "version": "1.0.0" },
    "node_modules/express": { "version": "4.18.2", "license": "MIT" },
    "node_modules/@types/node": { "version": "20.8.0", "license": "MIT", "dev": true },
    "node_modules/debug": { "version": "4.3.4" },
    "node_modules/express/node_modules/debug": { "version": "2.6.9", "license": "MIT" },
    "node_modules/fsevents": { "version": "2.3.3", "devOptional": true },
    "packages/local": { "version": "0.0.1", "link": true }
  }
}"#;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("package-lock.json"), LOCK).unwrap();
        let debug_dir = dir.path().join("node_modules").join("debug");
        std::fs::create_dir_all(&debug_dir).unwrap();
        std::fs::write(
            debug_dir.join("package.json"),
            r#"{ "name": "debug", "license": { "type": "MIT" }, "description": "small debugging utility" }"#,
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_lockfile_excludes_dev_entries() {
        let dir = project();
        let ctx = SourceContext::new(dir.path(), ["development"]);
        let deps = NpmSource::new().list_dependencies(&ctx).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        // serde_json maps iterate in key order
        assert_eq!(names, vec!["debug-4.3.4", "express", "debug-2.6.9"]);
    }

    #[test]
    fn test_installed_package_json_fills_metadata() {
        let dir = project();
        let ctx = SourceContext::new(dir.path(), ["development"]);
        let deps = NpmSource::new().list_dependencies(&ctx).unwrap();
        let debug = deps.iter().find(|d| d.version == "4.3.4").unwrap();
        assert_eq!(debug.metadata.get("license").map(String::as_str), Some("MIT"));
        assert_eq!(
            debug.metadata.get("summary").map(String::as_str),
            Some("small debugging utility")
        );
        assert_eq!(debug.path, Some(dir.path().join("node_modules/debug")));
    }

    #[test]
    fn test_dev_entries_kept_when_policy_allows() {
        let dir = project();
        let ctx = SourceContext::new(dir.path(), Vec::<String>::new());
        let deps = NpmSource::new().list_dependencies(&ctx).unwrap();
        assert!(deps.iter().any(|d| d.name == "@types/node"));
        assert!(deps.iter().any(|d| d.name == "fsevents"));
    }

    #[test]
    fn test_lockfile_v1_is_unavailable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("package-lock.json"),
            r#"{ "lockfileVersion": 1, "dependencies": {} }"#,
        )
        .unwrap();
        let ctx = SourceContext::new(dir.path(), ["development"]);
        assert!(matches!(
            NpmSource::new().list_dependencies(&ctx),
            Err(SourceError::Unavailable(_))
        ));
    }
}

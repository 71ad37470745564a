use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::graph::GroupGraph;
use super::{disambiguate, read_file, Source, SourceContext, DEFAULT_GROUP};
use crate::error::SourceError;
use crate::models::{Dependency, HOMEPAGE_KEY, LICENSE_KEY, SUMMARY_KEY};

pub const TYPE: &str = "cargo";

#[derive(Debug, Deserialize)]
struct CargoLock {
    #[serde(default)]
    package: Vec<CargoLockPackage>,
}

#[derive(Debug, Deserialize)]
struct CargoLockPackage {
    name: String,
    version: String,
    /// Packages without a `source` field are local workspace members.
    source: Option<String>,
    /// Entries are `name`, `name version` or `name version (source)`.
    #[serde(default)]
    dependencies: Vec<String>,
}

impl CargoLockPackage {
    fn id(&self) -> String {
        format!("{} {}", self.name, self.version)
    }
}

/// Crates resolved into `Cargo.lock`.
///
/// Dependency kinds of the root manifest map onto groups: `[dependencies]` is
/// `default`, `[dev-dependencies]` is `development`, `[build-dependencies]` is
/// `build`. Other workspace members count as `default`.
pub struct CargoSource;

impl CargoSource {
    pub fn new() -> Self {
        Self
    }
}

impl Source for CargoSource {
    fn type_name(&self) -> &'static str {
        TYPE
    }

    fn is_enabled(&self, ctx: &SourceContext) -> bool {
        ctx.root.join("Cargo.lock").exists()
    }

    fn list_dependencies(&self, ctx: &SourceContext) -> Result<Vec<Dependency>, SourceError> {
        let content = read_file(&ctx.root.join("Cargo.lock"))?;
        let lock: CargoLock = toml::from_str(&content)
            .map_err(|e| SourceError::Unavailable(format!("invalid Cargo.lock: {}", e)))?;

        let manifest_path = ctx.root.join("Cargo.toml");
        let manifest = if manifest_path.exists() {
            let content = read_file(&manifest_path)?;
            Some(parse_manifest(&content)?)
        } else {
            None
        };

        let groups = resolve_groups(&lock, manifest.as_ref())?;
        let registry_dirs = registry_dirs();

        let deps = lock
            .package
            .iter()
            // Skip local workspace members (they have no `source`)
            .filter(|p| p.source.is_some())
            .filter_map(|p| {
                let package_groups = groups.get(&p.id())?;
                ctx.includes(package_groups.iter().map(String::as_str))
                    .then(|| to_dependency(p, &registry_dirs))
            })
            .collect();

        disambiguate(deps)
    }
}

/// Direct dependencies of the root package, keyed by crate name.
#[derive(Debug, Default)]
struct Manifest {
    package: Option<String>,
    kinds: BTreeMap<String, BTreeSet<String>>,
}

fn parse_manifest(content: &str) -> Result<Manifest, SourceError> {
    let value: toml::Value = toml::from_str(content)
        .map_err(|e| SourceError::Unavailable(format!("invalid Cargo.toml: {}", e)))?;

    let mut manifest = Manifest {
        package: value
            .get("package")
            .and_then(|p| p.get("name"))
            .and_then(|n| n.as_str())
            .map(str::to_string),
        kinds: BTreeMap::new(),
    };

    let mut tables: Vec<&toml::Value> = vec![&value];
    if let Some(targets) = value.get("target").and_then(|t| t.as_table()) {
        tables.extend(targets.values());
    }

    for table in tables {
        for (section, group) in [
            ("dependencies", DEFAULT_GROUP),
            ("dev-dependencies", "development"),
            ("build-dependencies", "build"),
        ] {
            let Some(entries) = table.get(section).and_then(|s| s.as_table()) else {
                continue;
            };
            for (key, spec) in entries {
                // `foo = { package = "bar" }` renames the crate
                let name = spec
                    .get("package")
                    .and_then(|p| p.as_str())
                    .unwrap_or(key);
                manifest
                    .kinds
                    .entry(name.to_string())
                    .or_default()
                    .insert(group.to_string());
            }
        }
    }

    Ok(manifest)
}

fn resolve_groups(
    lock: &CargoLock,
    manifest: Option<&Manifest>,
) -> Result<BTreeMap<String, BTreeSet<String>>, SourceError> {
    let mut versions: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for p in &lock.package {
        versions.entry(&p.name).or_default().push(&p.version);
    }
    let resolve = |entry: &str| -> Result<String, SourceError> {
        let mut parts = entry.split_whitespace();
        let name = parts.next().unwrap_or(entry);
        match parts.next() {
            Some(version) => Ok(format!("{} {}", name, version)),
            None => match versions.get(name).map(Vec::as_slice) {
                Some([version]) => Ok(format!("{} {}", name, version)),
                _ => Err(SourceError::Resolution(format!(
                    "Cargo.lock dependency {} does not name a unique package",
                    entry
                ))),
            },
        }
    };

    let root_package = manifest.and_then(|m| m.package.as_deref());
    let mut graph = GroupGraph::new();

    for p in &lock.package {
        let is_root_member = p.source.is_none() && Some(p.name.as_str()) == root_package;
        for entry in &p.dependencies {
            let id = resolve(entry)?;
            // Edges out of members are kept so path dependencies are walked through
            graph.add_edge(&p.id(), &id);
            if p.source.is_some() {
                continue;
            }
            let name = entry.split_whitespace().next().unwrap_or(entry);
            match manifest.filter(|_| is_root_member).and_then(|m| m.kinds.get(name)) {
                Some(kinds) => kinds.iter().for_each(|k| graph.add_root(&id, k)),
                None if is_root_member => graph.add_root(&id, DEFAULT_GROUP),
                None => {}
            }
        }
    }

    // Members that nothing else in the workspace depends on are entry points
    let member_deps: BTreeSet<String> = lock
        .package
        .iter()
        .filter(|p| p.source.is_none())
        .flat_map(|p| p.dependencies.iter())
        .filter_map(|entry| resolve(entry).ok())
        .collect();
    for p in lock.package.iter().filter(|p| p.source.is_none()) {
        let is_root_member = Some(p.name.as_str()) == root_package;
        if is_root_member || member_deps.contains(&p.id()) {
            continue;
        }
        for entry in &p.dependencies {
            graph.add_root(&resolve(entry)?, DEFAULT_GROUP);
        }
    }

    if !graph.has_roots() {
        // No members recorded: treat every locked package as a requirement
        for p in &lock.package {
            graph.add_root(&p.id(), DEFAULT_GROUP);
        }
    }

    Ok(graph.propagate())
}

fn to_dependency(p: &CargoLockPackage, registry_dirs: &[PathBuf]) -> Dependency {
    let dep = Dependency::new(TYPE, &p.name, &p.version);
    let dir_name = format!("{}-{}", p.name, p.version);
    let Some(crate_dir) = registry_dirs
        .iter()
        .map(|d| d.join(&dir_name))
        .find(|d| d.is_dir())
    else {
        return dep;
    };

    let package = std::fs::read_to_string(crate_dir.join("Cargo.toml"))
        .ok()
        .and_then(|s| toml::from_str::<toml::Value>(&s).ok())
        .and_then(|v| v.get("package").cloned());
    let field = |key: &str| {
        package
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    dep.with_meta(SUMMARY_KEY, field("description"))
        .with_meta(HOMEPAGE_KEY, field("homepage").or_else(|| field("repository")))
        .with_meta(LICENSE_KEY, field("license"))
        .with_path(crate_dir)
}

/// Unpacked registry sources: `$CARGO_HOME/registry/src/<index>/`.
fn registry_dirs() -> Vec<PathBuf> {
    let cargo_home = std::env::var_os("CARGO_HOME")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".cargo")));
    let Some(src) = cargo_home.map(|h| h.join("registry").join("src")) else {
        return Vec::new();
    };
    list_dirs(&src)
}

fn list_dirs(path: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect()
        })
        .unwrap_or_default();
    found.sort();
    found
}

use super::{disambiguate, pattern, read_file, Source, SourceContext, DEFAULT_GROUP};
use crate::error::SourceError;
use crate::models::Dependency;

pub const TYPE: &str = "pip";

/// Python packages pinned by `Pipfile.lock`, or failing that by `==` lines
/// in `requirements.txt`.
///
/// `Pipfile.lock` keeps development packages in its `develop` section, which
/// maps to the `development` group.
pub struct PipSource;

impl PipSource {
    pub fn new() -> Self {
        Self
    }
}

impl Source for PipSource {
    fn type_name(&self) -> &'static str {
        TYPE
    }

    fn is_enabled(&self, ctx: &SourceContext) -> bool {
        ctx.root.join("Pipfile.lock").exists() || ctx.root.join("requirements.txt").exists()
    }

    fn list_dependencies(&self, ctx: &SourceContext) -> Result<Vec<Dependency>, SourceError> {
        let pipfile_lock = ctx.root.join("Pipfile.lock");
        let deps = if pipfile_lock.exists() {
            parse_pipfile_lock(&read_file(&pipfile_lock)?, ctx)?
        } else {
            parse_requirements_txt(&read_file(&ctx.root.join("requirements.txt"))?, ctx)?
        };
        disambiguate(deps)
    }
}

/// PEP 503 normalisation: case-insensitive, runs of `-_.` are equivalent.
fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_sep = false;
    for c in name.chars() {
        if matches!(c, '-' | '_' | '.') {
            if !last_sep {
                out.push('-');
            }
            last_sep = true;
        } else {
            out.push(c.to_ascii_lowercase());
            last_sep = false;
        }
    }
    out
}

fn parse_pipfile_lock(content: &str, ctx: &SourceContext) -> Result<Vec<Dependency>, SourceError> {
    let json: serde_json::Value = serde_json::from_str(content)
        .map_err(|e| SourceError::Unavailable(format!("invalid Pipfile.lock: {}", e)))?;
    let mut deps = Vec::new();

    for (section, group) in [("default", DEFAULT_GROUP), ("develop", "development")] {
        if !ctx.includes([group]) {
            continue;
        }
        let Some(pkgs) = json.get(section).and_then(|v| v.as_object()) else {
            continue;
        };
        for (name, info) in pkgs {
            // VCS and path requirements carry no pinned version
            let version = info
                .get("version")
                .and_then(|v| v.as_str())
                .map(|v| v.trim_start_matches("==").to_string())
                .or_else(|| info.get("ref").and_then(|r| r.as_str()).map(str::to_string))
                .ok_or_else(|| {
                    SourceError::Resolution(format!("{} is not pinned in Pipfile.lock", name))
                })?;
            deps.push(Dependency::new(TYPE, normalize_name(name), version));
        }
    }

    Ok(deps)
}

/// Parse `requirements.txt`; only exact `name==version` pins are resolved.
fn parse_requirements_txt(
    content: &str,
    ctx: &SourceContext,
) -> Result<Vec<Dependency>, SourceError> {
    if !ctx.includes([DEFAULT_GROUP]) {
        return Ok(Vec::new());
    }
    let re = pattern(r"^([A-Za-z0-9_\-\.]+)(?:\[[^\]]*\])?\s*==\s*([^\s;#]+)")?;
    let mut deps = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if let Some(caps) = re.captures(line) {
            deps.push(Dependency::new(TYPE, normalize_name(&caps[1]), &caps[2]));
        }
    }

    Ok(deps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> SourceContext {
        SourceContext::new(dir.path(), ["test", "development"])
    }

    #[test]
    fn test_pipfile_lock_skips_develop() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("Pipfile.lock"),
            r#"{
  "_meta": {},
  "default": {
    "requests": { "version": "==2.28.1" },
    "Flask_Login": { "version": "==0.6.3" }
  },
  "develop": {
    "pytest": { "version": "==7.4.0" }
  }
}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "ignored==1.0\n").unwrap();

        let source = PipSource::new();
        assert!(source.is_enabled(&ctx(&dir)));
        let deps = source.list_dependencies(&ctx(&dir)).unwrap();
        let pairs: Vec<_> = deps
            .iter()
            .map(|d| (d.name.as_str(), d.version.as_str()))
            .collect();
        assert_eq!(pairs, vec![("flask-login", "0.6.3"), ("requests", "2.28.1")]);
    }

    #[test]
    fn test_requirements_txt_pins_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("requirements.txt"),
            "# comment\nrequests==2.28.1\nflask>=2.0.0\n-r other.txt\nuvicorn[standard]==0.23.2 ; python_version >= '3.8'\n",
        )
        .unwrap();

        let deps = PipSource::new().list_dependencies(&ctx(&dir)).unwrap();
        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].name, "requests");
        assert_eq!(deps[1].name, "uvicorn");
        assert_eq!(deps[1].version, "0.23.2");
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Flask_Login"), "flask-login");
        assert_eq!(normalize_name("zope..interface"), "zope-interface");
    }
}

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::debug;

use super::env_scope::{EnvScope, EnvSpec};
use super::graph::GroupGraph;
use super::{disambiguate, pattern, read_file, Source, SourceContext, DEFAULT_GROUP};
use crate::error::SourceError;
use crate::models::{Dependency, HOMEPAGE_KEY, LICENSE_KEY, SUMMARY_KEY};

pub const TYPE: &str = "rubygem";

/// `(gemfile, lockfile)` naming conventions understood by Bundler.
const GEMFILES: [(&str, &str); 2] = [("Gemfile", "Gemfile.lock"), ("gems.rb", "gems.locked")];

/// Ruby gems resolved by Bundler.
///
/// Bundler is configured through process-wide environment variables, so
/// enumeration runs inside an [`EnvScope`]: inherited `BUNDLE_*` settings are
/// cleared and `BUNDLE_GEMFILE` points at the project's Gemfile.
pub struct BundlerSource;

impl BundlerSource {
    pub fn new() -> Self {
        Self
    }

    fn files(root: &Path) -> Option<(PathBuf, PathBuf)> {
        GEMFILES
            .iter()
            .map(|(gemfile, lockfile)| (root.join(gemfile), root.join(lockfile)))
            .find(|(_, lockfile)| lockfile.exists())
    }
}

impl Source for BundlerSource {
    fn type_name(&self) -> &'static str {
        TYPE
    }

    fn is_enabled(&self, ctx: &SourceContext) -> bool {
        Self::files(&ctx.root).is_some()
    }

    fn exclusive_global_config(&self) -> bool {
        true
    }

    fn list_dependencies(&self, ctx: &SourceContext) -> Result<Vec<Dependency>, SourceError> {
        let (gemfile, lockfile) = Self::files(&ctx.root)
            .ok_or_else(|| SourceError::Unavailable("no Gemfile.lock found".to_string()))?;

        let _scope = EnvScope::acquire(&EnvSpec {
            clear_prefixes: vec!["BUNDLE_", "BUNDLER_"],
            clear_vars: vec!["RUBYOPT", "RUBYLIB"],
            set: vec![("BUNDLE_GEMFILE".to_string(), OsString::from(&gemfile))],
        });

        // Read back through the scoped environment, the way Bundler itself would
        let gemfile = std::env::var_os("BUNDLE_GEMFILE")
            .map(PathBuf::from)
            .unwrap_or(gemfile);
        let gem_dirs = gem_dirs();
        let gemspecs = GemspecParser::new()?;

        let lock = parse_lockfile(&read_file(&lockfile)?)?;
        let mut declared = parse_gemfile(&read_file(&gemfile)?)?;
        declared.add_gemspec_development(gemfile.parent().unwrap_or(ctx.root.as_path()))?;

        let mut graph = GroupGraph::new();
        for name in &lock.dependencies {
            match declared.groups.get(name) {
                Some(groups) => groups.iter().for_each(|g| graph.add_root(name, g)),
                None => graph.add_root(name, DEFAULT_GROUP),
            }
        }
        for spec in &lock.specs {
            for dep in &spec.dependencies {
                graph.add_edge(&spec.name, dep);
            }
        }
        let groups = graph.propagate();

        let mut deps = Vec::new();
        for spec in &lock.specs {
            let Some(spec_groups) = groups.get(&spec.name) else {
                debug!(gem = %spec.name, "not required by any Gemfile group, skipping");
                continue;
            };
            if !ctx.includes(spec_groups.iter().map(String::as_str)) {
                continue;
            }
            deps.push(spec.to_dependency(&ctx.root, &gem_dirs, &gemspecs));
        }

        disambiguate(deps)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SpecSource {
    Gem,
    Git,
    Path(String),
}

#[derive(Debug, Clone)]
struct LockedSpec {
    name: String,
    /// Version with any platform suffix, as it appears in directory names.
    /// One entry per platform variant, in lockfile order.
    full_versions: Vec<String>,
    source: SpecSource,
    dependencies: Vec<String>,
}

impl LockedSpec {
    fn version(&self) -> &str {
        let full = self.full_versions.first().map(String::as_str).unwrap_or("");
        // Gem versions never contain '-'; anything after it is the platform
        full.split('-').next().unwrap_or(full)
    }

    fn to_dependency(
        &self,
        root: &Path,
        gem_dirs: &[PathBuf],
        gemspecs: &GemspecParser,
    ) -> Dependency {
        let dep = Dependency::new(TYPE, &self.name, self.version());

        match &self.source {
            SpecSource::Path(remote) => dep.with_path(root.join(remote)),
            SpecSource::Git => dep,
            SpecSource::Gem => {
                // Only the variant built for this platform is installed
                let installed = self.full_versions.iter().find_map(|full_version| {
                    let dir_name = format!("{}-{}", self.name, full_version);
                    gem_dirs
                        .iter()
                        .find(|d| d.join("gems").join(&dir_name).is_dir())
                        .map(|home| (home, dir_name))
                });
                let Some((home, dir_name)) = installed else {
                    return dep;
                };
                let gemspec = home
                    .join("specifications")
                    .join(format!("{}.gemspec", dir_name));
                let meta = std::fs::read_to_string(gemspec)
                    .map(|s| gemspecs.parse(&s))
                    .unwrap_or_default();
                dep.with_path(home.join("gems").join(&dir_name))
                    .with_meta(SUMMARY_KEY, meta.summary)
                    .with_meta(HOMEPAGE_KEY, meta.homepage)
                    .with_meta(LICENSE_KEY, meta.license)
            }
        }
    }
}

#[derive(Debug, Default)]
struct Lockfile {
    specs: Vec<LockedSpec>,
    /// Top-level requirements from the `DEPENDENCIES` section.
    dependencies: Vec<String>,
}

/// Parse a `Gemfile.lock`.
///
/// ```text
/// GEM
///   remote: https://rubygems.org/
///   specs:
///     nokogiri (1.15.0-x86_64-linux)
///       racc (~> 1.4)
///
/// DEPENDENCIES
///   nokogiri
/// ```
fn parse_lockfile(content: &str) -> Result<Lockfile, SourceError> {
    let mut lock = Lockfile::default();
    let mut section = "";
    let mut remote = String::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut current: Option<usize> = None;

    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(' ') {
            section = line.trim();
            remote.clear();
            current = None;
            continue;
        }

        let indent = line.len() - line.trim_start().len();
        let text = line.trim();
        let (name, version) = split_spec(text);

        match (section, indent) {
            ("GEM" | "GIT" | "PATH", 2) => {
                if let Some(value) = text.strip_prefix("remote:") {
                    remote = value.trim().to_string();
                }
            }
            ("GEM" | "GIT" | "PATH", 4) => {
                let Some(version) = version else {
                    return Err(SourceError::Unavailable(format!(
                        "Gemfile.lock line {}: spec without version: {}",
                        lineno + 1,
                        text
                    )));
                };
                // Platform variants of one gem share a single graph node
                if let Some(&i) = index.get(name) {
                    let spec = &mut lock.specs[i];
                    if !spec.full_versions.iter().any(|v| v == version) {
                        spec.full_versions.push(version.to_string());
                    }
                    current = Some(i);
                    continue;
                }
                index.insert(name.to_string(), lock.specs.len());
                current = Some(lock.specs.len());
                lock.specs.push(LockedSpec {
                    name: name.to_string(),
                    full_versions: vec![version.to_string()],
                    source: match section {
                        "GIT" => SpecSource::Git,
                        "PATH" => SpecSource::Path(remote.clone()),
                        _ => SpecSource::Gem,
                    },
                    dependencies: Vec::new(),
                });
            }
            ("GEM" | "GIT" | "PATH", 6) => {
                if let Some(spec) = current.and_then(|i| lock.specs.get_mut(i)) {
                    if spec.name != name && !spec.dependencies.iter().any(|d| d == name) {
                        spec.dependencies.push(name.to_string());
                    }
                }
            }
            ("DEPENDENCIES", 2) => {
                lock.dependencies
                    .push(name.trim_end_matches('!').to_string());
            }
            _ => {}
        }
    }

    if lock.specs.is_empty() && lock.dependencies.is_empty() {
        return Err(SourceError::Unavailable(
            "Gemfile.lock contains no specs".to_string(),
        ));
    }
    Ok(lock)
}

/// Split `name (version)` into its parts.
fn split_spec(text: &str) -> (&str, Option<&str>) {
    match text.split_once(" (") {
        Some((name, rest)) => (name.trim(), Some(rest.trim_end_matches(')').trim())),
        None => (text.trim(), None),
    }
}

/// Keywords that open an `end`-terminated block when they start a line.
const BLOCK_KEYWORDS: [&str; 10] = [
    "if", "unless", "case", "begin", "while", "until", "for", "def", "class", "module",
];

/// What a Gemfile says about groups, beyond what the lockfile records.
#[derive(Debug, Default)]
struct Gemfile {
    /// Groups declared for each gem. Gems outside any group are `default`.
    groups: BTreeMap<String, BTreeSet<String>>,
    gemspecs: Vec<GemspecDirective>,
}

/// A `gemspec` line: the project's own gemspec supplies dependencies.
#[derive(Debug, Clone, PartialEq)]
struct GemspecDirective {
    /// Directory holding the `.gemspec`, relative to the Gemfile.
    path: String,
    /// Group for the gemspec's `add_development_dependency` entries.
    development_group: String,
}

impl Gemfile {
    /// Put the development dependencies of every referenced gemspec in their
    /// group, unless the Gemfile declares the gem itself.
    fn add_gemspec_development(&mut self, project_dir: &Path) -> Result<(), SourceError> {
        if self.gemspecs.is_empty() {
            return Ok(());
        }
        let dev_re = pattern(r#"\.add_development_dependency\s*\(?\s*["']([^"']+)["']"#)?;

        for directive in &self.gemspecs {
            let dir = project_dir.join(&directive.path);
            let entries = std::fs::read_dir(&dir).map_err(|e| {
                SourceError::Unavailable(format!("cannot read {}: {}", dir.display(), e))
            })?;
            let mut specs: Vec<PathBuf> = entries
                .flatten()
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "gemspec"))
                .collect();
            specs.sort();

            for spec in specs {
                let content = read_file(&spec)?;
                for caps in dev_re.captures_iter(&content) {
                    self.groups
                        .entry(caps[1].to_string())
                        .or_insert_with(|| BTreeSet::from([directive.development_group.clone()]));
                }
            }
        }
        Ok(())
    }
}

/// Parse the group structure of a Gemfile: `group ... do` blocks,
/// `group:`/`groups:` options and `gemspec` directives.
fn parse_gemfile(content: &str) -> Result<Gemfile, SourceError> {
    let gem_re = pattern(r#"^gem\s*\(?\s*["']([^"']+)["']"#)?;
    let group_block_re = pattern(r"^group\s*\(?\s*(.+?)\)?\s+do\b")?;
    let group_opt_re =
        pattern(r#"(?:\bgroups?:|:groups?\s*=>)\s*(\[[^\]]*\]|:\w+|["'][^"']+["'])"#)?;
    let symbol_re = pattern(r#":?["']?(\w+)["']?"#)?;
    let gemspec_re = pattern(r"^gemspec\b")?;
    let path_opt_re = pattern(r#"(?:\bpath:|:path\s*=>)\s*["']([^"']+)["']"#)?;
    let dev_group_opt_re =
        pattern(r#"(?:\bdevelopment_group:|:development_group\s*=>)\s*:?["']?(\w+)"#)?;

    let symbols = |list: &str| -> Vec<String> {
        symbol_re
            .captures_iter(list)
            .map(|c| c[1].to_string())
            .collect()
    };

    let mut gemfile = Gemfile::default();
    // One entry per open block; non-group blocks contribute no groups
    let mut blocks: Vec<Vec<String>> = Vec::new();

    for raw in content.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let keyword = line
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .next()
            .unwrap_or("");
        if keyword == "end" {
            blocks.pop();
            continue;
        }
        if let Some(caps) = group_block_re.captures(line) {
            blocks.push(symbols(&caps[1]));
            continue;
        }
        if gemspec_re.is_match(line) {
            gemfile.gemspecs.push(GemspecDirective {
                path: path_opt_re
                    .captures(line)
                    .map_or_else(|| ".".to_string(), |c| c[1].to_string()),
                development_group: dev_group_opt_re
                    .captures(line)
                    .map_or_else(|| "development".to_string(), |c| c[1].to_string()),
            });
            continue;
        }
        if let Some(caps) = gem_re.captures(line) {
            let mut groups: BTreeSet<String> = blocks.iter().flatten().cloned().collect();
            if let Some(opt) = group_opt_re.captures(line) {
                groups.extend(symbols(&opt[1]));
            }
            if groups.is_empty() {
                groups.insert(DEFAULT_GROUP.to_string());
            }
            gemfile
                .groups
                .entry(caps[1].to_string())
                .or_default()
                .extend(groups);
        }

        let keyword_block = BLOCK_KEYWORDS.contains(&keyword) && !line.ends_with(" end");
        if keyword_block || line.ends_with(" do") || line.contains(" do |") {
            blocks.push(Vec::new());
        }
    }

    Ok(gemfile)
}

#[derive(Debug, Default)]
struct GemspecMeta {
    summary: Option<String>,
    homepage: Option<String>,
    license: Option<String>,
}

/// Reads summary, homepage and license out of installed `.gemspec` files.
struct GemspecParser {
    summary: Regex,
    homepage: Regex,
    license: Regex,
    licenses: Regex,
    quoted: Regex,
}

impl GemspecParser {
    fn new() -> Result<Self, SourceError> {
        let field = |key: &str| pattern(&format!(r#"(?m)^\s*s\.{}\s*=\s*"((?:[^"\\]|\\.)*)""#, key));
        Ok(Self {
            summary: field("summary")?,
            homepage: field("homepage")?,
            license: field("license")?,
            licenses: pattern(r#"(?m)^\s*s\.licenses\s*=\s*\[([^\]]*)\]"#)?,
            quoted: pattern(r#""([^"]+)""#)?,
        })
    }

    fn parse(&self, content: &str) -> GemspecMeta {
        let field = |re: &Regex| re.captures(content).map(|c| c[1].replace("\\\"", "\""));
        let licenses = self.licenses.captures(content).and_then(|c| {
            let ids: Vec<&str> = self
                .quoted
                .captures_iter(c.get(1)?.as_str())
                .filter_map(|q| q.get(1).map(|m| m.as_str()))
                .collect();
            (!ids.is_empty()).then(|| ids.join(" OR "))
        });

        GemspecMeta {
            summary: field(&self.summary),
            homepage: field(&self.homepage),
            license: licenses.or_else(|| field(&self.license)),
        }
    }
}

/// Candidate gem installation roots: `$GEM_HOME`, `$GEM_PATH` entries, then
/// the per-user gem directories under `~/.gem/ruby`.
fn gem_dirs() -> Vec<PathBuf> {
    let mut dirs_found = Vec::new();
    if let Some(home) = std::env::var_os("GEM_HOME") {
        dirs_found.push(PathBuf::from(home));
    }
    if let Some(path) = std::env::var_os("GEM_PATH") {
        dirs_found.extend(std::env::split_paths(&path));
    }
    if let Some(home) = dirs::home_dir() {
        if let Ok(entries) = std::fs::read_dir(home.join(".gem").join("ruby")) {
            let mut versions: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
            versions.sort();
            dirs_found.extend(versions.into_iter().rev());
        }
    }
    dirs_found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LOCKFILE: &str = r#"GIT
  remote: https://github.com/example/forked.git
  revision: 0123456789abcdef
  specs:
    forked (0.2.0)

PATH
  remote: engines/admin
  specs:
    admin (0.1.0)
      rake

GEM
  remote: https://rubygems.org/
  specs:
    diff-lcs (1.5.0)
    nokogiri (1.15.0-x86_64-linux)
      racc (~> 1.4)
    nokogiri (1.15.0-arm64-darwin)
      racc (~> 1.4)
    racc (1.7.1)
    rake (13.0.6)
    rspec (3.12.0)
      rspec-core (~> 3.12.0)
    rspec-core (3.12.2)
      diff-lcs (>= 1.2.0)

PLATFORMS
  arm64-darwin
  x86_64-linux

DEPENDENCIES
  admin!
  forked!
  nokogiri (~> 1.15)
  rspec (~> 3.12)

BUNDLED WITH
   2.4.10
"#;

    const GEMFILE: &str = r#"source "https://rubygems.org"

gem "nokogiri", "~> 1.15"
gem "forked", git: "https://github.com/example/forked.git"
gem "admin", path: "engines/admin"

group :test, :development do
  gem "rspec", "~> 3.12" # specs
end
"#;

    fn project(gemfile: &str, lockfile: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Gemfile"), gemfile).unwrap();
        std::fs::write(dir.path().join("Gemfile.lock"), lockfile).unwrap();
        dir
    }

    #[test]
    fn test_parse_lockfile() {
        let lock = parse_lockfile(LOCKFILE).unwrap();
        let names: Vec<_> = lock.specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["forked", "admin", "diff-lcs", "nokogiri", "racc", "rake", "rspec", "rspec-core"]
        );
        let nokogiri = &lock.specs[3];
        assert_eq!(nokogiri.version(), "1.15.0");
        assert_eq!(
            nokogiri.full_versions,
            vec!["1.15.0-x86_64-linux", "1.15.0-arm64-darwin"]
        );
        assert_eq!(nokogiri.dependencies, vec!["racc"]);
        assert_eq!(lock.specs[1].source, SpecSource::Path("engines/admin".to_string()));
        assert_eq!(lock.dependencies, vec!["admin", "forked", "nokogiri", "rspec"]);
    }

    #[test]
    fn test_parse_gemfile_groups() {
        let gemfile = parse_gemfile(
            r#"
gem "rails"
gem 'pry', group: :development
gem "rubocop", groups: [:development, :lint]
gem "capybara", :group => :test
platforms :jruby do
  gem "jdbc"
end
group :test do
  gem "rspec"
end
"#,
        )
        .unwrap();
        let groups = gemfile.groups;
        assert!(gemfile.gemspecs.is_empty());
        let get = |n: &str| groups[n].iter().cloned().collect::<Vec<_>>();
        assert_eq!(get("rails"), vec!["default"]);
        assert_eq!(get("pry"), vec!["development"]);
        assert_eq!(get("rubocop"), vec!["development", "lint"]);
        assert_eq!(get("capybara"), vec!["test"]);
        assert_eq!(get("jdbc"), vec!["default"]);
        assert_eq!(get("rspec"), vec!["test"]);
    }

    #[test]
    fn test_list_excludes_test_and_development_groups() {
        let dir = project(GEMFILE, LOCKFILE);
        let ctx = SourceContext::new(dir.path(), ["test", "development"]);
        let source = BundlerSource::new();
        assert!(source.is_enabled(&ctx));

        let deps = source.list_dependencies(&ctx).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["forked", "admin", "nokogiri", "racc", "rake"]);
        assert!(deps.iter().all(|d| d.source_type == TYPE));
        assert_eq!(deps[1].path, Some(dir.path().join("engines/admin")));
    }

    #[test]
    fn test_list_with_custom_group_policy() {
        let dir = project(GEMFILE, LOCKFILE);
        let ctx = SourceContext::new(dir.path(), Vec::<String>::new());
        let deps = BundlerSource::new().list_dependencies(&ctx).unwrap();
        assert!(deps.iter().any(|d| d.name == "rspec-core"));
        assert!(deps.iter().any(|d| d.name == "diff-lcs"));
    }

    #[test]
    fn test_missing_gemfile_is_unavailable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Gemfile.lock"), LOCKFILE).unwrap();
        let ctx = SourceContext::new(dir.path(), ["test"]);
        assert!(matches!(
            BundlerSource::new().list_dependencies(&ctx),
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_corrupt_lockfile_is_unavailable() {
        let dir = project(GEMFILE, "GEM\n  specs:\n    broken\n");
        let ctx = SourceContext::new(dir.path(), ["test"]);
        assert!(matches!(
            BundlerSource::new().list_dependencies(&ctx),
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_parse_gemspec() {
        let meta = GemspecParser::new().unwrap().parse(
            r#"
Gem::Specification.new do |s|
  s.name = "nokogiri".freeze
  s.summary = "Nokogiri makes it easy and painless to work with XML and HTML.".freeze
  s.homepage = "https://nokogiri.org".freeze
  s.licenses = ["MIT".freeze]
end
"#,
        );
        assert_eq!(meta.homepage.as_deref(), Some("https://nokogiri.org"));
        assert_eq!(meta.license.as_deref(), Some("MIT"));
        assert!(meta.summary.unwrap().starts_with("Nokogiri"));
    }

    #[test]
    fn test_conditional_inside_group_keeps_group() {
        let gemfile = parse_gemfile(
            r#"
group :development do
  if RUBY_VERSION >= "3.0"
    gem "debug"
  end
  unless ENV["CI"] then gem "guard" end
  gem "pry"
  case RUBY_ENGINE
  when "jruby"
    gem "jruby-openssl"
  end
end
gem "rails"
"#,
        )
        .unwrap();
        let get = |n: &str| gemfile.groups[n].iter().cloned().collect::<Vec<_>>();
        assert_eq!(get("debug"), vec!["development"]);
        assert_eq!(get("pry"), vec!["development"]);
        assert_eq!(get("jruby-openssl"), vec!["development"]);
        assert_eq!(get("rails"), vec!["default"]);
    }

    #[test]
    fn test_parse_gemspec_directive() {
        let gemfile = parse_gemfile(
            "gemspec\ngemspec path: \"engines/core\", development_group: :dev\n",
        )
        .unwrap();
        assert_eq!(
            gemfile.gemspecs,
            vec![
                GemspecDirective {
                    path: ".".to_string(),
                    development_group: "development".to_string(),
                },
                GemspecDirective {
                    path: "engines/core".to_string(),
                    development_group: "dev".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_gemspec_development_dependencies_are_excluded() {
        let dir = project(
            "source \"https://rubygems.org\"\n\ngemspec\n",
            r#"PATH
  remote: .
  specs:
    mygem (0.1.0)
      rack (>= 2.0)

GEM
  remote: https://rubygems.org/
  specs:
    rack (3.0.8)
    rspec (3.12.0)
      rspec-core (~> 3.12.0)
    rspec-core (3.12.2)

DEPENDENCIES
  mygem!
  rspec (~> 3.12)
"#,
        );
        std::fs::write(
            dir.path().join("mygem.gemspec"),
            r#"Gem::Specification.new do |spec|
  spec.name = "mygem"
  spec.add_dependency "rack", ">= 2.0"
  spec.add_development_dependency("rspec", "~> 3.12")
end
"#,
        )
        .unwrap();

        let ctx = SourceContext::new(dir.path(), ["test", "development"]);
        let deps = BundlerSource::new().list_dependencies(&ctx).unwrap();
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["mygem", "rack"]);

        let ctx = SourceContext::new(dir.path(), ["test"]);
        let deps = BundlerSource::new().list_dependencies(&ctx).unwrap();
        assert!(deps.iter().any(|d| d.name == "rspec-core"));
    }

    #[test]
    fn test_installed_platform_variant_is_found() {
        let lock = parse_lockfile(LOCKFILE).unwrap();
        let nokogiri = lock.specs.iter().find(|s| s.name == "nokogiri").unwrap();

        let home = TempDir::new().unwrap();
        std::fs::create_dir_all(home.path().join("gems/nokogiri-1.15.0-arm64-darwin")).unwrap();
        std::fs::create_dir_all(home.path().join("specifications")).unwrap();
        std::fs::write(
            home.path()
                .join("specifications/nokogiri-1.15.0-arm64-darwin.gemspec"),
            "  s.licenses = [\"MIT\".freeze]\n",
        )
        .unwrap();

        let parser = GemspecParser::new().unwrap();
        let gem_dirs = [home.path().to_path_buf()];
        let dep = nokogiri.to_dependency(Path::new("/project"), &gem_dirs, &parser);
        assert_eq!(dep.version, "1.15.0");
        assert_eq!(
            dep.path,
            Some(home.path().join("gems").join("nokogiri-1.15.0-arm64-darwin"))
        );
        assert_eq!(dep.metadata.get(LICENSE_KEY).map(String::as_str), Some("MIT"));
    }
}

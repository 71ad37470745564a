//! Reconciliation of live dependency enumerations against the cache.
//!
//! Every enabled source is enumerated on its own blocking worker. Sources
//! that own the process-wide environment are additionally serialised through
//! one async lock, so their timeout only counts their own work. Report
//! assembly waits for every source, successful or not.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Serialize, Serializer};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::error::SourceError;
use crate::fingerprint::fingerprint;
use crate::licenses::LicenseScanner;
use crate::models::{CachedRecord, Dependency, LicenseText};
use crate::policy::LicensePolicy;
use crate::sources::registry::SourceHandle;

/// How a dependency moved relative to its cached record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Drift {
    New,
    Unchanged,
    Changed,
    Removed,
}

impl std::fmt::Display for Drift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Drift::New => write!(f, "new"),
            Drift::Unchanged => write!(f, "unchanged"),
            Drift::Changed => write!(f, "changed"),
            Drift::Removed => write!(f, "removed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Classify only; the cache is not touched.
    Status,
    /// Classify and write the results to the cache.
    Cache,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub mode: Mode,
    pub prune: bool,
    pub source_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    #[serde(rename = "type")]
    pub source_type: String,
    pub name: String,
    pub version: String,
    pub status: Drift,
    pub license: Option<String>,
    pub reviewed: bool,
    pub ignored: bool,
    pub stale: bool,
    pub needs_review: bool,
    /// Human-readable differences against the previous record.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diff: Vec<String>,
    /// The record this entry replaced, kept for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<CachedRecord>,
    /// Cache update failure for this dependency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Entry {
    fn from_record(record: &CachedRecord, status: Drift) -> Self {
        Entry {
            source_type: record.source_type.clone(),
            name: record.name.clone(),
            version: record.version.clone(),
            status,
            license: record.license.clone(),
            reviewed: record.reviewed,
            ignored: record.ignored,
            stale: record.stale,
            needs_review: false,
            diff: Vec::new(),
            previous: None,
            error: None,
        }
    }

    pub fn needs_attention(&self) -> bool {
        self.needs_review || self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceFailure {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(serialize_with = "serialize_display")]
    pub cause: SourceError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Complete,
    /// At least one source failed but another succeeded.
    Incomplete,
    /// No source produced results.
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub mode: Mode,
    pub outcome: Outcome,
    /// Sources that enumerated successfully, in registration order.
    pub sources: Vec<String>,
    pub entries: Vec<Entry>,
    pub failures: Vec<SourceFailure>,
    pub warnings: Vec<String>,
}

impl Report {
    pub fn count(&self, status: Drift) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    pub fn needs_attention(&self) -> bool {
        self.entries.iter().any(Entry::needs_attention)
    }

    /// `0` clean, `1` review required or scan incomplete, `2` scan failed.
    pub fn exit_code(&self) -> u8 {
        match self.outcome {
            Outcome::Failed => 2,
            Outcome::Incomplete => 1,
            Outcome::Complete if self.needs_attention() => 1,
            Outcome::Complete => 0,
        }
    }
}

pub struct Engine {
    store: CacheStore,
    policy: LicensePolicy,
    scanner: LicenseScanner,
    options: Options,
}

/// Everything one source contributed to the report.
#[derive(Default)]
struct SourceResult {
    entries: Vec<Entry>,
    warnings: Vec<String>,
}

impl Engine {
    pub fn new(
        store: CacheStore,
        policy: LicensePolicy,
        options: Options,
    ) -> Result<Arc<Self>, regex::Error> {
        Ok(Arc::new(Self {
            store,
            policy,
            scanner: LicenseScanner::new()?,
            options,
        }))
    }

    /// Enumerate every source, reconcile it against the cache and assemble
    /// the report. `on_source_done` is called as each source finishes.
    pub async fn run<F>(self: &Arc<Self>, sources: Vec<SourceHandle>, on_source_done: F) -> Report
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let exclusive = Arc::new(Mutex::new(()));
        let on_source_done = Arc::new(on_source_done);

        let tasks = sources.into_iter().map(|handle| {
            let engine = Arc::clone(self);
            let exclusive = Arc::clone(&exclusive);
            let on_source_done = Arc::clone(&on_source_done);
            async move {
                let source_type = handle.type_name().to_string();
                let outcome = match engine.enumerate(handle, &exclusive).await {
                    Ok(deps) => engine.clone().reconcile_source(source_type.clone(), deps).await,
                    Err(e) => Err(e),
                };
                on_source_done(source_type.as_str());
                (source_type, outcome)
            }
        });

        // Barrier: every source has finished, one way or another
        let results = join_all(tasks).await;

        let mut report = Report {
            mode: self.options.mode,
            outcome: Outcome::Complete,
            sources: Vec::new(),
            entries: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        };

        // `results` is in registration order; entries keep that grouping and
        // are sorted by name within each source.
        for (source_type, outcome) in results {
            match outcome {
                Ok(mut result) => {
                    result.entries.sort_by(|a, b| a.name.cmp(&b.name));
                    report.entries.extend(result.entries);
                    report.warnings.extend(result.warnings);
                    report.sources.push(source_type);
                }
                Err(cause) => {
                    warn!(source = %source_type, "{}", cause);
                    report.failures.push(SourceFailure { source_type, cause });
                }
            }
        }

        report.outcome = if report.sources.is_empty() {
            Outcome::Failed
        } else if !report.failures.is_empty() {
            Outcome::Incomplete
        } else {
            Outcome::Complete
        };
        report
    }

    async fn enumerate(
        &self,
        handle: SourceHandle,
        exclusive: &Mutex<()>,
    ) -> Result<Vec<Dependency>, SourceError> {
        let _turn = if handle.exclusive_global_config() {
            Some(exclusive.lock().await)
        } else {
            None
        };

        let source_type = handle.type_name();
        let task = tokio::task::spawn_blocking(move || handle.dependencies().map(<[_]>::to_vec));
        let joined = match self.options.source_timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                // The worker cannot be cancelled; its result is discarded
                Err(_) => return Err(SourceError::Timeout(limit)),
            },
            None => task.await,
        };
        let deps = joined.map_err(|e| {
            SourceError::Resolution(format!("{} enumeration aborted: {}", source_type, e))
        })??;

        let mut names = HashSet::new();
        if let Some(dup) = deps.iter().find(|d| !names.insert((&d.source_type, &d.name))) {
            return Err(SourceError::Resolution(format!(
                "dependency {} reported twice",
                dup.name
            )));
        }

        info!(source = source_type, count = deps.len(), "enumerated dependencies");
        Ok(deps)
    }

    async fn reconcile_source(
        self: Arc<Self>,
        source_type: String,
        deps: Vec<Dependency>,
    ) -> Result<SourceResult, SourceError> {
        let task = tokio::task::spawn_blocking(move || self.reconcile(&source_type, &deps));
        task.await
            .map_err(|e| SourceError::Resolution(format!("reconciliation aborted: {}", e)))
    }

    /// Classify one source's dependencies and removed records.
    fn reconcile(&self, source_type: &str, deps: &[Dependency]) -> SourceResult {
        let mut result = SourceResult::default();
        let persist = self.options.mode == Mode::Cache;

        for dep in deps {
            let found = self.scanner.discover(dep.path.as_deref());
            let fp = fingerprint(dep, &found.licenses, &found.notices);

            let cached = match self.store.load(&dep.source_type, &dep.name) {
                Ok(cached) => cached,
                Err(e) => {
                    // Treated as missing, which may hide a real change
                    warn!("{}", e);
                    result.warnings.push(e.to_string());
                    None
                }
            };

            let (mut entry, write) = match cached {
                None => {
                    let record =
                        CachedRecord::from_dependency(dep, found.licenses, found.notices, fp);
                    let mut entry = Entry::from_record(&record, Drift::New);
                    entry.needs_review = true;
                    (entry, Some(record))
                }
                Some(old) if old.fingerprint == fp => {
                    let mut entry = Entry::from_record(&old, Drift::Unchanged);
                    entry.needs_review =
                        !old.accepted() && !self.policy.allows(old.license.as_deref());
                    let revived = old.stale.then(|| CachedRecord { stale: false, ..old });
                    entry.stale = false;
                    (entry, revived)
                }
                Some(old) => {
                    let mut record =
                        CachedRecord::from_dependency(dep, found.licenses, found.notices, fp);
                    record.ignored = old.ignored;
                    let mut entry = Entry::from_record(&record, Drift::Changed);
                    entry.needs_review = !record.ignored;
                    entry.diff = diff_records(&old, &record);
                    entry.previous = Some(old);
                    (entry, Some(record))
                }
            };

            debug!(source = source_type, name = %dep.name, status = %entry.status, "classified");
            if let (true, Some(record)) = (persist, write) {
                if let Err(e) = self.store.save(&record) {
                    warn!("{}", e);
                    entry.error = Some(e.to_string());
                }
            }
            result.entries.push(entry);
        }

        let current: HashSet<&str> = deps.iter().map(|d| d.name.as_str()).collect();
        let cached = match self.store.list_all(source_type) {
            Ok(records) => records,
            Err(e) => {
                warn!("{}", e);
                result
                    .warnings
                    .push(format!("cannot list cached {} records: {}", source_type, e));
                Vec::new()
            }
        };

        for record in cached.into_iter().filter(|r| !current.contains(r.name.as_str())) {
            let mut entry = Entry::from_record(&record, Drift::Removed);
            entry.stale = !self.options.prune;
            entry.needs_review = !self.options.prune && !record.accepted();

            let write = match (persist, self.options.prune) {
                (false, _) => Ok(()),
                (true, true) => self.store.delete(&record.source_type, &record.name),
                (true, false) if record.stale => Ok(()),
                (true, false) => self.store.save(&CachedRecord {
                    stale: true,
                    ..record
                }),
            };
            if let Err(e) = write {
                warn!("{}", e);
                entry.error = Some(e.to_string());
            }
            result.entries.push(entry);
        }

        result
    }
}

/// Describe what changed between two records of the same dependency.
fn diff_records(old: &CachedRecord, new: &CachedRecord) -> Vec<String> {
    let mut lines = Vec::new();
    let mut field = |key: &str, a: Option<&str>, b: Option<&str>| {
        if a != b {
            lines.push(format!(
                "{}: {} -> {}",
                key,
                a.unwrap_or("(none)"),
                b.unwrap_or("(none)")
            ));
        }
    };

    field("version", Some(old.version.as_str()), Some(new.version.as_str()));
    field("license", old.license.as_deref(), new.license.as_deref());
    field("summary", old.summary.as_deref(), new.summary.as_deref());
    field("homepage", old.homepage.as_deref(), new.homepage.as_deref());

    let keys: std::collections::BTreeSet<&String> =
        old.metadata.keys().chain(new.metadata.keys()).collect();
    for key in keys {
        field(
            key.as_str(),
            old.metadata.get(key).map(String::as_str),
            new.metadata.get(key).map(String::as_str),
        );
    }

    diff_texts("license text", &old.licenses, &new.licenses, &mut lines);
    diff_texts("notice", &old.notices, &new.notices, &mut lines);
    lines
}

fn diff_texts(kind: &str, old: &[LicenseText], new: &[LicenseText], lines: &mut Vec<String>) {
    for before in old {
        match new.iter().find(|t| t.sources == before.sources) {
            None => lines.push(format!("{} removed: {}", kind, before.sources)),
            Some(after) if after.text != before.text => {
                lines.push(format!("{} changed: {}", kind, before.sources));
                let kept: HashSet<&str> = after.text.lines().collect();
                let had: HashSet<&str> = before.text.lines().collect();
                for line in before.text.lines().filter(|l| !kept.contains(l)) {
                    lines.push(format!("  - {}", line));
                }
                for line in after.text.lines().filter(|l| !had.contains(l)) {
                    lines.push(format!("  + {}", line));
                }
            }
            Some(_) => {}
        }
    }
    for after in new.iter().filter(|t| !old.iter().any(|o| o.sources == t.sources)) {
        lines.push(format!("{} added: {}", kind, after.sources));
    }
}

fn serialize_display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: std::fmt::Display,
    S: Serializer,
{
    serializer.collect_str(value)
}

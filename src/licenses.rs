use std::path::Path;

use regex::Regex;
use tracing::debug;

use crate::models::LicenseText;

/// License and notice texts found in a dependency's installed directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub licenses: Vec<LicenseText>,
    pub notices: Vec<LicenseText>,
}

/// Matches names like `LICENSE`, `LICENSE-MIT`, `licence.txt`, `COPYING.md`, `UNLICENSE`.
const LICENSE_PATTERN: &str = r"(?i)^(un)?licen[sc]e|^copying";
const NOTICE_PATTERN: &str = r"(?i)^(notice|authors|copyright)";

/// Files larger than this are skipped.
const MAX_TEXT_SIZE: u64 = 512 * 1024;

/// Compiled file-name patterns for license and notice files.
#[derive(Debug, Clone)]
pub struct LicenseScanner {
    license_re: Regex,
    notice_re: Regex,
}

impl LicenseScanner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            license_re: Regex::new(LICENSE_PATTERN)?,
            notice_re: Regex::new(NOTICE_PATTERN)?,
        })
    }

    /// Scan the top level of `path` for license and notice files.
    ///
    /// A missing or unreadable directory yields nothing; texts are sorted by file name.
    pub fn discover(&self, path: Option<&Path>) -> Discovered {
        let mut found = Discovered::default();
        let Some(dir) = path else {
            return found;
        };
        let Ok(entries) = std::fs::read_dir(dir) else {
            debug!(path = %dir.display(), "no installed content to scan for licenses");
            return found;
        };

        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() || meta.len() > MAX_TEXT_SIZE {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            let bucket = if self.license_re.is_match(&file_name) {
                &mut found.licenses
            } else if self.notice_re.is_match(&file_name) {
                &mut found.notices
            } else {
                continue;
            };
            // Non-UTF-8 files are not license text we can record
            if let Ok(text) = std::fs::read_to_string(entry.path()) {
                bucket.push(LicenseText {
                    sources: file_name,
                    text: text.replace("\r\n", "\n"),
                });
            }
        }

        found.licenses.sort_by(|a, b| a.sources.cmp(&b.sources));
        found.notices.sort_by(|a, b| a.sources.cmp(&b.sources));
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_license_and_notice_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("LICENSE-MIT"), "MIT\r\ntext").unwrap();
        std::fs::write(dir.path().join("COPYING"), "GPL").unwrap();
        std::fs::write(dir.path().join("NOTICE.txt"), "Copyright Foo").unwrap();
        std::fs::write(dir.path().join("README.md"), "readme").unwrap();
        std::fs::create_dir(dir.path().join("license")).unwrap();

        let found = LicenseScanner::new().unwrap().discover(Some(dir.path()));
        let names: Vec<_> = found.licenses.iter().map(|l| l.sources.as_str()).collect();
        assert_eq!(names, vec!["COPYING", "LICENSE-MIT"]);
        assert_eq!(found.licenses[1].text, "MIT\ntext");
        assert_eq!(found.notices.len(), 1);
        assert_eq!(found.notices[0].sources, "NOTICE.txt");
    }

    #[test]
    fn test_discover_missing_path() {
        let scanner = LicenseScanner::new().unwrap();
        assert_eq!(scanner.discover(None), Discovered::default());
        assert_eq!(
            scanner.discover(Some(Path::new("/nonexistent/license-ledger"))),
            Discovered::default()
        );
    }
}

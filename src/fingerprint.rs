use sha2::{Digest, Sha256};

use crate::models::{Dependency, LicenseText};

/// Compute the content fingerprint that decides `Changed` versus `Unchanged`.
///
/// Covers source type, name, version, every metadata entry, and the text of
/// every license and notice file. Review flags are not part of it.
pub fn fingerprint(dep: &Dependency, licenses: &[LicenseText], notices: &[LicenseText]) -> String {
    let mut hasher = Sha256::new();
    let mut field = |key: &str, value: &str| {
        hasher.update(key.as_bytes());
        hasher.update([0u8]);
        hasher.update(value.len().to_le_bytes());
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    };

    field("type", &dep.source_type);
    field("name", &dep.name);
    field("version", &dep.version);
    // BTreeMap iteration is already sorted
    for (key, value) in &dep.metadata {
        field(&format!("meta:{}", key), value);
    }
    for text in sorted(licenses) {
        field(&format!("license:{}", text.sources), &text.text);
    }
    for text in sorted(notices) {
        field(&format!("notice:{}", text.sources), &text.text);
    }

    hex::encode(hasher.finalize())
}

fn sorted(texts: &[LicenseText]) -> Vec<&LicenseText> {
    let mut texts: Vec<&LicenseText> = texts.iter().collect();
    texts.sort_by(|a, b| a.sources.cmp(&b.sources).then_with(|| a.text.cmp(&b.text)));
    texts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(sources: &str, text: &str) -> LicenseText {
        LicenseText {
            sources: sources.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let dep = Dependency::new("npm", "lodash", "4.17.21")
            .with_meta("license", Some("MIT".to_string()));
        let licenses = vec![text("LICENSE", "MIT License")];
        assert_eq!(
            fingerprint(&dep, &licenses, &[]),
            fingerprint(&dep.clone(), &licenses, &[])
        );
    }

    #[test]
    fn test_fingerprint_ignores_license_order() {
        let dep = Dependency::new("npm", "lodash", "4.17.21");
        let a = vec![text("LICENSE", "one"), text("COPYING", "two")];
        let b = vec![text("COPYING", "two"), text("LICENSE", "one")];
        assert_eq!(fingerprint(&dep, &a, &[]), fingerprint(&dep, &b, &[]));
    }

    #[test]
    fn test_fingerprint_tracks_version_and_text() {
        let dep = Dependency::new("rubygem", "nokogiri", "1.15.0");
        let bumped = Dependency::new("rubygem", "nokogiri", "1.15.1");
        let base = fingerprint(&dep, &[], &[]);
        assert_ne!(base, fingerprint(&bumped, &[], &[]));
        assert_ne!(base, fingerprint(&dep, &[text("LICENSE", "MIT")], &[]));
        assert_ne!(
            fingerprint(&dep, &[text("LICENSE", "MIT")], &[]),
            fingerprint(&dep, &[], &[text("LICENSE", "MIT")])
        );
    }

    #[test]
    fn test_fingerprint_separates_fields() {
        let a = Dependency::new("npm", "ab", "1");
        let b = Dependency::new("npm", "a", "b1");
        assert_ne!(fingerprint(&a, &[], &[]), fingerprint(&b, &[], &[]));
    }
}

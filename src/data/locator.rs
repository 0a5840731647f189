//! File Locator Module
//! Resolves site keywords to files and sheets regardless of Unicode normalization form.

use crate::config::MatchMode;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

/// Normalize text to Unicode Normalization Form C.
pub fn normalize_nfc(s: &str) -> String {
    s.nfc().collect()
}

/// Compare a candidate name against a target after normalizing both to NFC.
pub fn names_match(candidate: &str, target: &str, mode: MatchMode) -> bool {
    let candidate = normalize_nfc(candidate);
    let target = normalize_nfc(target);
    match mode {
        MatchMode::Exact => candidate == target,
        MatchMode::Contains => candidate.contains(&target),
    }
}

/// Pick the first sheet whose NFC name equals the NFC site name, in workbook order.
pub fn match_sheet<'a>(sheet_names: &'a [String], site: &str) -> Option<&'a str> {
    sheet_names
        .iter()
        .find(|name| names_match(name, site, MatchMode::Exact))
        .map(String::as_str)
}

/// Looks up files inside a single directory.
///
/// Candidates are ordered by their NFC name so that "first match" does not depend
/// on the platform's directory enumeration order.
#[derive(Debug, Clone)]
pub struct Locator {
    dir: PathBuf,
}

impl Locator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Regular files in the directory as `(nfc_name, path)`, sorted by name.
    /// A missing or unreadable directory yields no candidates.
    pub fn candidates(&self) -> Vec<(String, PathBuf)> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.dir.display(), error = %e, "directory not readable");
                return Vec::new();
            }
        };

        let mut files: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| {
                let name = normalize_nfc(&entry.file_name().to_string_lossy());
                (name, entry.path())
            })
            .collect();

        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }

    /// All files matching the target, in candidate order.
    pub fn find_all(&self, target: &str, mode: MatchMode) -> Vec<PathBuf> {
        self.candidates()
            .into_iter()
            .filter(|(name, _)| names_match(name, target, mode))
            .map(|(_, path)| path)
            .collect()
    }

    /// The first file matching the target, or `None`.
    pub fn find(&self, target: &str, mode: MatchMode) -> Option<PathBuf> {
        let mut matches = self.find_all(target, mode);
        if matches.len() > 1 {
            warn!(
                target = target,
                candidates = ?matches,
                "several files match, using the first by name"
            );
        }
        if matches.is_empty() {
            None
        } else {
            Some(matches.swap_remove(0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use unicode_normalization::UnicodeNormalization;

    fn nfd(s: &str) -> String {
        s.nfd().collect()
    }

    #[test]
    fn test_normalization_is_idempotent() {
        for s in ["동산고_환경데이터", "plain ascii", "", "é and e\u{301}"] {
            let once = normalize_nfc(s);
            assert_eq!(normalize_nfc(&once), once);
        }
        let decomposed = nfd("송도고");
        assert_eq!(normalize_nfc(&normalize_nfc(&decomposed)), normalize_nfc(&decomposed));
    }

    #[test]
    fn test_composed_and_decomposed_are_equal() {
        let composed = "아라고_환경데이터.csv";
        let decomposed = nfd(composed);
        assert_ne!(composed.as_bytes(), decomposed.as_bytes());
        assert!(names_match(&decomposed, composed, MatchMode::Exact));
        assert!(names_match(composed, &decomposed, MatchMode::Exact));
    }

    #[test]
    fn test_containment_across_forms() {
        let candidate = nfd("2025-05-01_하늘고_환경데이터.csv.csv");
        assert!(names_match(&candidate, "하늘고", MatchMode::Contains));
        assert!(names_match("prefix_하늘고.csv", &nfd("하늘고"), MatchMode::Contains));
        assert!(!names_match(&candidate, "하늘고", MatchMode::Exact));
        assert!(!names_match("동산고.csv", "하늘고", MatchMode::Contains));
    }

    #[test]
    fn test_match_sheet_exact_only() {
        let sheets = vec![nfd("동산고"), "송도고 결과".to_string(), "아라고".to_string()];
        assert_eq!(match_sheet(&sheets, "동산고"), Some(sheets[0].as_str()));
        assert_eq!(match_sheet(&sheets, "아라고"), Some("아라고"));
        assert_eq!(match_sheet(&sheets, "송도고"), None);
    }

    #[test]
    fn test_missing_directory_is_no_match() {
        let locator = Locator::new("/definitely/not/here/at/all");
        assert!(locator.candidates().is_empty());
        assert_eq!(locator.find("anything", MatchMode::Contains), None);
    }

    #[test]
    fn test_find_decomposed_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let stored = nfd("동산고_환경데이터.csv");
        fs::write(dir.path().join(&stored), "time,ec\n").unwrap();
        fs::create_dir(dir.path().join("동산고_환경데이터.csv.d")).unwrap();

        let locator = Locator::new(dir.path());
        let found = locator.find("동산고_환경데이터.csv", MatchMode::Exact).unwrap();
        assert_eq!(found, dir.path().join(&stored));

        // Directories are never candidates
        assert_eq!(locator.find_all("동산고", MatchMode::Contains).len(), 1);
    }

    #[test]
    fn test_first_match_is_lexicographic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_송도고.csv", "a_송도고.csv", "c_송도고.csv"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let locator = Locator::new(dir.path());
        let all = locator.find_all("송도고", MatchMode::Contains);
        assert_eq!(all.len(), 3);
        assert_eq!(
            locator.find("송도고", MatchMode::Contains),
            Some(dir.path().join("a_송도고.csv"))
        );
    }
}

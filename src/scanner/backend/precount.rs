//! File and directory counting for daemon scans, whose output carries no
//! summary counts.

use std::path::Path;
use walkdir::WalkDir;

use crate::detection::parser::CountHints;
use crate::scanner::exclusions::ExclusionMatcher;
use crate::utils::paths::absolutize;

/// Count what a scan of `root` will visit, honouring exclusions.
///
/// A relative root is walked as its absolute form so location rules apply.
/// Excluded directories are pruned without descending. The root counts as
/// one directory when anything was counted. Any walk error, and
/// cancellation, yields zero counts.
pub fn count_targets<F>(root: &Path, matcher: &ExclusionMatcher, is_cancelled: F) -> (u64, u64)
where
    F: Fn() -> bool,
{
    let root = absolutize(root);
    let root = root.as_path();

    if root.is_file() {
        return if matcher.is_path_excluded(root, false) {
            (0, 0)
        } else {
            (1, 0)
        };
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !(e.file_type().is_dir() && matcher.is_path_excluded(e.path(), true))
        });

    let mut files = 0u64;
    let mut dirs = 0u64;

    for entry in walker {
        if is_cancelled() {
            return (0, 0);
        }

        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("Pre-count of {} aborted: {}", root.display(), e);
                return (0, 0);
            }
        };

        if entry.depth() == 0 {
            continue;
        }

        if entry.file_type().is_dir() {
            dirs += 1;
        } else if !matcher.is_path_excluded(entry.path(), false) {
            files += 1;
        }
    }

    if files > 0 || dirs > 0 {
        dirs += 1;
    }

    (files, dirs)
}

/// [`count_targets`] packaged as parser hints.
pub fn count_hints<F>(root: &Path, matcher: &ExclusionMatcher, is_cancelled: F) -> CountHints
where
    F: Fn() -> bool,
{
    let (files, dirs) = count_targets(root, matcher, is_cancelled);
    CountHints::new(files, dirs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ExclusionKind, ExclusionRule};
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::write(path, b"data").unwrap();
    }

    #[test]
    fn test_excluded_subdirectory_is_pruned() {
        let dir = tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            touch(&dir.path().join(name));
        }
        let skipped = dir.path().join("node_modules");
        fs::create_dir(&skipped).unwrap();
        touch(&skipped.join("d.js"));
        touch(&skipped.join("e.js"));

        let matcher = ExclusionMatcher::new(&[ExclusionRule::new("node_modules", ExclusionKind::Directory)]);
        assert_eq!(count_targets(dir.path(), &matcher, || false), (3, 1));

        let everything = ExclusionMatcher::default();
        assert_eq!(count_targets(dir.path(), &everything, || false), (5, 2));
    }

    #[test]
    fn test_file_patterns_and_prefixes() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("keep.bin"));
        touch(&dir.path().join("drop.log"));
        let private = dir.path().join("private");
        fs::create_dir(&private).unwrap();
        touch(&private.join("secret.bin"));

        let matcher = ExclusionMatcher::new(&[
            ExclusionRule::new("*.log", ExclusionKind::Pattern),
            ExclusionRule::new(private.to_string_lossy(), ExclusionKind::Directory),
        ]);
        assert_eq!(count_targets(dir.path(), &matcher, || false), (1, 1));
    }

    #[test]
    fn test_relative_root_honours_location_rules() {
        // relative to the working directory, as a CLI argument would be
        let cwd = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir_in(&cwd).unwrap();
        let relative = dir.path().strip_prefix(&cwd).unwrap().to_path_buf();
        assert!(relative.is_relative());

        let skip = relative.join("skip");
        fs::create_dir(&skip).unwrap();
        touch(&skip.join("a"));
        touch(&relative.join("b"));

        let rule = ExclusionRule::new(absolutize(&skip).to_string_lossy(), ExclusionKind::Directory);
        let matcher = ExclusionMatcher::new(&[rule]);

        assert_eq!(count_targets(&absolutize(&relative), &matcher, || false), (1, 1));
        assert_eq!(count_targets(&relative, &matcher, || false), (1, 1));
    }

    #[test]
    fn test_single_file_and_empty_dir() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("one.exe");
        touch(&file);
        assert_eq!(count_targets(&file, &ExclusionMatcher::default(), || false), (1, 0));

        let empty = tempdir().unwrap();
        assert_eq!(count_targets(empty.path(), &ExclusionMatcher::default(), || false), (0, 0));
    }

    #[test]
    fn test_missing_root_and_cancellation_yield_zero() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("x"));
        assert_eq!(
            count_targets(&dir.path().join("missing"), &ExclusionMatcher::default(), || false),
            (0, 0)
        );
        assert_eq!(count_targets(dir.path(), &ExclusionMatcher::default(), || true), (0, 0));
    }
}

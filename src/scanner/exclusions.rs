//! Exclusion matching shared by command building and daemon pre-counting.
//!
//! Patterns that are absolute or start with `~` match by path prefix. Any
//! other pattern is a shell glob tested against both the base name and the
//! full path. Globs follow `fnmatch` rules: `*` also crosses `/`.

use regex::Regex;
use std::path::{Path, PathBuf};

use crate::core::types::{ExclusionKind, ExclusionRule, ExclusionSet};
use crate::utils::paths::expand_home;

/// Characters with special meaning in POSIX extended regular expressions.
const ERE_SPECIAL: &[char] = &['.', '^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '\\'];

/// Escape a literal for an engine `--exclude` regex.
pub fn escape_ere(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ERE_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Translate the body of a glob (no anchors) using `escape` for literals.
fn translate_glob(glob: &str, escape: fn(&str) -> String) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                // Collapse runs of stars
                while i < chars.len() && chars[i] == '*' {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str(&escape("["));
                } else {
                    let inner: String = chars[i..j].iter().collect();
                    let inner = inner.replace('\\', "\\\\");
                    out.push('[');
                    if let Some(rest) = inner.strip_prefix('!') {
                        out.push('^');
                        out.push_str(rest);
                    } else if let Some(rest) = inner.strip_prefix('^') {
                        out.push_str("\\^");
                        out.push_str(rest);
                    } else {
                        out.push_str(&inner);
                    }
                    out.push(']');
                    i = j + 1;
                }
            }
            other => out.push_str(&escape(&other.to_string())),
        }
    }

    out
}

/// Translate a glob into an anchored regex for the engine's exclude flags.
///
/// `*.log` becomes `^.*\.log$`.
pub fn glob_to_regex(glob: &str) -> String {
    format!("^{}$", translate_glob(glob, escape_ere))
}

/// Regex for a glob that may also match the final component of a path, as
/// the engine matches exclude flags against full paths.
fn name_glob_to_regex(glob: &str) -> String {
    if glob.contains('/') {
        glob_to_regex(glob)
    } else {
        format!("(^|/){}$", translate_glob(glob, escape_ere))
    }
}

/// Build the engine exclude flags for a set of rules.
///
/// Directory rules always use `--exclude-dir`; everything else uses
/// `--exclude`. Location rules are anchored at the start of the path.
pub fn exclusion_flags(rules: &[ExclusionRule]) -> Vec<String> {
    let mut flags = Vec::new();

    for rule in rules.iter().filter(|r| r.enabled) {
        let pattern = rule.pattern.trim();
        if pattern.is_empty() {
            continue;
        }

        let flag = match rule.kind {
            ExclusionKind::Directory => "--exclude-dir",
            ExclusionKind::File | ExclusionKind::Pattern => "--exclude",
        };

        let regex = if rule.is_path_prefix() {
            let location = expand_home(pattern);
            let escaped = escape_ere(location.to_string_lossy().trim_end_matches('/'));
            match rule.kind {
                ExclusionKind::Directory => format!("^{}(/|$)", escaped),
                _ => format!("^{}$", escaped),
            }
        } else {
            name_glob_to_regex(pattern)
        };

        flags.push(format!("{}={}", flag, regex));
    }

    flags
}

#[derive(Debug, Clone)]
enum Matcher {
    Prefix(PathBuf),
    Glob(Regex),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    kind: ExclusionKind,
    matcher: Matcher,
}

impl CompiledRule {
    fn compile(rule: &ExclusionRule) -> Option<Self> {
        let pattern = rule.pattern.trim();
        if !rule.enabled || pattern.is_empty() {
            return None;
        }

        let matcher = if rule.is_path_prefix() {
            Matcher::Prefix(expand_home(pattern))
        } else {
            let source = format!("(?s)^{}$", translate_glob(pattern, regex::escape));
            match Regex::new(&source) {
                Ok(re) => Matcher::Glob(re),
                Err(e) => {
                    log::warn!("Skipping unusable exclusion pattern {:?}: {}", pattern, e);
                    return None;
                }
            }
        };

        Some(Self {
            kind: rule.kind,
            matcher,
        })
    }

    fn applies_to(&self, is_directory: bool) -> bool {
        match (&self.matcher, self.kind) {
            (Matcher::Prefix(_), _) => true,
            (Matcher::Glob(_), ExclusionKind::Directory) => is_directory,
            (Matcher::Glob(_), _) => !is_directory,
        }
    }

    fn matches(&self, full_path: &Path, base_name: &str) -> bool {
        match &self.matcher {
            Matcher::Prefix(prefix) => full_path.starts_with(prefix),
            Matcher::Glob(re) => {
                re.is_match(base_name) || re.is_match(&full_path.to_string_lossy())
            }
        }
    }
}

/// Pre-compiled exclusion rules.
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    rules: Vec<CompiledRule>,
}

impl ExclusionMatcher {
    /// Compile a list of rules. Disabled and empty rules are dropped.
    pub fn new(rules: &[ExclusionRule]) -> Self {
        Self {
            rules: rules.iter().filter_map(CompiledRule::compile).collect(),
        }
    }

    /// Compile the effective rules of a scan's exclusion snapshot.
    pub fn from_set(set: &ExclusionSet) -> Self {
        Self::new(&set.effective_rules())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Check whether a path should be skipped.
    ///
    /// Directory rules given as globs only apply to directories; file and
    /// pattern globs only to files. Location rules apply to both.
    pub fn is_excluded(&self, full_path: &Path, base_name: &str, is_directory: bool) -> bool {
        self.rules
            .iter()
            .filter(|rule| rule.applies_to(is_directory))
            .any(|rule| rule.matches(full_path, base_name))
    }

    /// Convenience wrapper deriving the base name from the path.
    pub fn is_path_excluded(&self, full_path: &Path, is_directory: bool) -> bool {
        let base_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.is_excluded(full_path, &base_name, is_directory)
    }
}

/// One-shot form of [`ExclusionMatcher::is_excluded`].
pub fn is_excluded(
    full_path: &Path,
    base_name: &str,
    rules: &[ExclusionRule],
    is_directory: bool,
) -> bool {
    ExclusionMatcher::new(rules).is_excluded(full_path, base_name, is_directory)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, kind: ExclusionKind) -> ExclusionRule {
        ExclusionRule::new(pattern, kind)
    }

    #[test]
    fn test_glob_to_regex() {
        assert_eq!(glob_to_regex("*.log"), r"^.*\.log$");
        assert_eq!(glob_to_regex("file?.txt"), r"^file.\.txt$");
        assert_eq!(glob_to_regex("a**b"), "^a.*b$");
        assert_eq!(glob_to_regex("[!a]x"), "^[^a]x$");
        assert_eq!(glob_to_regex("x[y"), r"^x\[y$");
        assert_eq!(glob_to_regex("(a|b)+"), r"^\(a\|b\)\+$");
    }

    #[test]
    fn test_generated_regex_matches_like_glob() {
        let re = Regex::new(&glob_to_regex("*.tmp")).unwrap();
        assert!(re.is_match("/var/cache/x.tmp"));
        assert!(!re.is_match("/var/cache/x.tmpl"));
    }

    #[test]
    fn test_glob_matches_name_or_full_path() {
        let rules = vec![rule("*.log", ExclusionKind::Pattern)];
        assert!(is_excluded(Path::new("/a/b/app.log"), "app.log", &rules, false));
        assert!(!is_excluded(Path::new("/a/b/app.txt"), "app.txt", &rules, false));

        let rules = vec![rule("*/build/*.o", ExclusionKind::File)];
        assert!(is_excluded(Path::new("/src/build/x.o"), "x.o", &rules, false));
        assert!(!is_excluded(Path::new("/src/x.o"), "x.o", &rules, false));
    }

    #[test]
    fn test_prefix_rules() {
        let rules = vec![rule("/srv/data", ExclusionKind::Directory)];
        assert!(is_excluded(Path::new("/srv/data"), "data", &rules, true));
        assert!(is_excluded(Path::new("/srv/data/x/y.bin"), "y.bin", &rules, false));
        assert!(!is_excluded(Path::new("/srv/database"), "database", &rules, true));

        let home = dirs::home_dir().unwrap();
        let rules = vec![rule("~/Downloads", ExclusionKind::Directory)];
        assert!(is_excluded(&home.join("Downloads/a.iso"), "a.iso", &rules, false));
    }

    #[test]
    fn test_kind_scoping_for_globs() {
        let rules = vec![rule("node_modules", ExclusionKind::Directory)];
        assert!(is_excluded(Path::new("/p/node_modules"), "node_modules", &rules, true));
        assert!(!is_excluded(Path::new("/p/node_modules"), "node_modules", &rules, false));

        let rules = vec![rule("*.iso", ExclusionKind::Pattern)];
        assert!(!is_excluded(Path::new("/p/images.iso"), "images.iso", &rules, true));
    }

    #[test]
    fn test_disabled_rules_ignored() {
        let mut r = rule("*", ExclusionKind::Pattern);
        r.enabled = false;
        assert!(!is_excluded(Path::new("/x"), "x", &[r], false));
    }

    #[test]
    fn test_is_excluded_is_pure() {
        let rules = vec![
            rule("*.log", ExclusionKind::Pattern),
            rule("/opt/skip", ExclusionKind::Directory),
        ];
        let matcher = ExclusionMatcher::new(&rules);
        for (path, is_dir) in [("/opt/skip/a", false), ("/x/y.log", false), ("/x/y", true)] {
            let first = matcher.is_path_excluded(Path::new(path), is_dir);
            let second = matcher.is_path_excluded(Path::new(path), is_dir);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_exclusion_flags() {
        let rules = vec![
            rule("*.log", ExclusionKind::Pattern),
            rule("node_modules", ExclusionKind::Directory),
            rule("/srv/cache/", ExclusionKind::Directory),
            rule("/etc/shadow", ExclusionKind::File),
            rule("cache/*.bin", ExclusionKind::Pattern),
        ];
        let flags = exclusion_flags(&rules);
        assert_eq!(
            flags,
            vec![
                r"--exclude=(^|/).*\.log$".to_string(),
                "--exclude-dir=(^|/)node_modules$".to_string(),
                "--exclude-dir=^/srv/cache(/|$)".to_string(),
                "--exclude=^/etc/shadow$".to_string(),
                r"--exclude=^cache/.*\.bin$".to_string(),
            ]
        );
    }
}

//! Threat classification from engine signature names.
//!
//! ClamAV names look like `Win.Trojan.Agent-123` or `PUA.Win.Adware.X`, so
//! classification is keyword matching on the lower-cased name.

use crate::core::types::Severity;

const CRITICAL_KEYWORDS: &[&str] = &[
    "ransomware",
    "ransom",
    "rootkit",
    "bootkit",
    "cryptolocker",
    "wannacry",
    "locky",
    "petya",
    "ryuk",
    "cerber",
];

const HIGH_KEYWORDS: &[&str] = &[
    "trojan",
    "worm",
    "backdoor",
    "exploit",
    "downloader",
    "dropper",
    "keylogger",
];

const MEDIUM_KEYWORDS: &[&str] = &["adware", "pua", "pup", "spyware", "coinminer", "miner"];

const LOW_KEYWORDS: &[&str] = &["eicar", "test-signature", "test.file", "heuristic", "generic"];

/// Specific keywords. Any hit here wins over the generic table.
const PRIMARY_CATEGORIES: &[(&str, &str)] = &[
    ("ransomware", "Ransomware"),
    ("ransom", "Ransomware"),
    ("rootkit", "Rootkit"),
    ("bootkit", "Rootkit"),
    ("trojan", "Trojan"),
    ("worm", "Worm"),
    ("backdoor", "Backdoor"),
    ("exploit", "Exploit"),
    ("adware", "Adware"),
    ("spyware", "Spyware"),
    ("keylogger", "Spyware"),
    ("eicar", "Test"),
    ("test-signature", "Test"),
    ("test.file", "Test"),
    ("macro", "Macro"),
    ("phishing", "Phishing"),
    ("heuristic", "Heuristic"),
];

/// Generic markers, consulted only when no primary keyword occurs.
const GENERIC_CATEGORIES: &[(&str, &str)] = &[("pua", "PUA"), ("pup", "PUA"), ("virus", "Virus")];

/// Category for unrecognised detections.
pub const DEFAULT_CATEGORY: &str = "Virus";

/// Category for an empty signature name.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Map a threat name to a severity. Unmatched names are Medium.
pub fn classify_severity(threat_name: &str) -> Severity {
    let name = threat_name.to_lowercase();
    if name.is_empty() {
        return Severity::Medium;
    }

    let tiers: [(&[&str], Severity); 4] = [
        (CRITICAL_KEYWORDS, Severity::Critical),
        (HIGH_KEYWORDS, Severity::High),
        (MEDIUM_KEYWORDS, Severity::Medium),
        (LOW_KEYWORDS, Severity::Low),
    ];

    tiers
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| name.contains(k)))
        .map(|(_, severity)| *severity)
        .unwrap_or(Severity::Medium)
}

/// Map a threat name to a category label.
///
/// Within a table the keyword occurring earliest in the name wins; ties go
/// to the earlier table entry.
pub fn categorize_threat(threat_name: &str) -> &'static str {
    let name = threat_name.to_lowercase();
    if name.is_empty() {
        return UNKNOWN_CATEGORY;
    }

    earliest_match(&name, PRIMARY_CATEGORIES)
        .or_else(|| earliest_match(&name, GENERIC_CATEGORIES))
        .unwrap_or(DEFAULT_CATEGORY)
}

fn earliest_match(name: &str, table: &[(&str, &'static str)]) -> Option<&'static str> {
    let mut best: Option<(usize, &'static str)> = None;
    for (keyword, category) in table {
        if let Some(pos) = name.find(keyword) {
            if best.map_or(true, |(best_pos, _)| pos < best_pos) {
                best = Some((pos, *category));
            }
        }
    }
    best.map(|(_, category)| category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_names() {
        for name in ["Win.Ransomware.Locky", "Unix.Ransomware.Agent-1", "win.RANSOMWARE.x"] {
            assert_eq!(classify_severity(name), Severity::Critical, "{}", name);
            assert_eq!(categorize_threat(name), "Ransomware", "{}", name);
        }
        assert_eq!(classify_severity("Linux.Rootkit.Agent"), Severity::Critical);
        assert_eq!(categorize_threat("Win.Bootkit.Foo"), "Rootkit");
    }

    #[test]
    fn test_severity_tiers() {
        assert_eq!(classify_severity("Win.Trojan.Agent-1"), Severity::High);
        assert_eq!(classify_severity("Win.Downloader.Small"), Severity::High);
        assert_eq!(classify_severity("PUA.Win.Adware.Generic"), Severity::Medium);
        assert_eq!(classify_severity("Multios.Coinminer.X"), Severity::Medium);
        assert_eq!(classify_severity("Eicar-Test-Signature"), Severity::Low);
        assert_eq!(classify_severity("Heuristics.Generic.Thing"), Severity::Low);
        assert_eq!(classify_severity("Something.Odd"), Severity::Medium);
        assert_eq!(classify_severity(""), Severity::Medium);
    }

    #[test]
    fn test_earliest_keyword_wins() {
        assert_eq!(categorize_threat("Win.Trojan.Worm-1"), "Trojan");
        assert_eq!(categorize_threat("Win.Worm.Trojan-1"), "Worm");
        assert_eq!(categorize_threat("PUA.Win.Adware.Generic"), "Adware");
    }

    #[test]
    fn test_generic_table_only_without_primary_hit() {
        assert_eq!(categorize_threat("PUA.Win.Tool.Packed"), "PUA");
        assert_eq!(categorize_threat("Win.Virus.Sality"), "Virus");
        // "pua" comes first in the string but "spyware" is a primary keyword
        assert_eq!(categorize_threat("PUA.Andr.Spyware.X"), "Spyware");
    }

    #[test]
    fn test_category_defaults() {
        assert_eq!(categorize_threat(""), "Unknown");
        assert_eq!(categorize_threat("Win.Packed.Foo"), "Virus");
        assert_eq!(categorize_threat("Eicar-Test-Signature"), "Test");
        assert_eq!(categorize_threat("Doc.Macro.Agent"), "Macro");
        assert_eq!(categorize_threat("Html.Phishing.Bank"), "Phishing");
    }
}

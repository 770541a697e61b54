//! Free-text name normalization.

/// Canonical comparison key for a free-text name.
///
/// Lower-cases, drops every character that is not a letter, digit or
/// whitespace, then trims and collapses whitespace runs to single spaces.
/// Total and idempotent.
pub fn normalize(raw: &str) -> String {
    let kept: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "   ",
        "Port Royale",
        "  PORT   royale  ",
        "St. John's",
        "Cannon (24lb)",
        "Wood\t\tPlanks\n",
        "Ædelgard Ünion",
        "---",
        "a-b_c",
        "İstanbul",
    ];

    #[test]
    fn test_normalize_basic() {
        assert_eq!(normalize("  PORT   royale  "), "port royale");
        assert_eq!(normalize("St. John's"), "st johns");
        assert_eq!(normalize("Cannon (24lb)"), "cannon 24lb");
        assert_eq!(normalize("Wood\t\tPlanks\n"), "wood planks");
    }

    #[test]
    fn test_normalize_strips_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("---"), "");
    }

    #[test]
    fn test_normalize_keeps_unicode_letters() {
        assert_eq!(normalize("Ædelgard Ünion"), "ædelgard ünion");
    }

    #[test]
    fn test_normalize_removes_punctuation_without_splitting() {
        assert_eq!(normalize("a-b_c"), "abc");
    }

    #[test]
    fn test_normalize_idempotent() {
        for s in SAMPLES {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }
}

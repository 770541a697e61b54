//! Edit-distance similarity.

/// `1 - levenshtein(a, b) / max(len(a), len(b))`, measured in chars.
///
/// Identical inputs (including two empty strings) score 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = strsim::levenshtein(a, b);
    1.0 - distance as f64 / max_len as f64
}

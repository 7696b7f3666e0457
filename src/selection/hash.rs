/// Deterministic 31-multiplier string hash over UTF-16 code units, folded to
/// a non-negative value. Used as a stable per-subject game id.
pub fn string_hash(value: &str) -> u32 {
    let hash = value
        .encode_utf16()
        .fold(0i32, |acc, unit| acc.wrapping_mul(31).wrapping_add(unit as i32));
    hash.unsigned_abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_values() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("France"), 2112320571);
    }

    #[test]
    fn is_stable_across_calls() {
        assert_eq!(string_hash("Côte d'Ivoire"), string_hash("Côte d'Ivoire"));
        assert_ne!(string_hash("Chad"), string_hash("Romania"));
    }
}

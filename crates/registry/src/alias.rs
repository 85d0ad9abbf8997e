/// Registry key for a surface form: lowercased with whitespace, hyphens and
/// underscores removed, so "Second hand", "second-hand" and "secondhand"
/// share one entry.
#[must_use]
pub fn normalize_alias(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_compound_spellings() {
        assert_eq!(normalize_alias("second hand"), "secondhand");
        assert_eq!(normalize_alias("Second-Hand"), "secondhand");
        assert_eq!(normalize_alias("second_hand"), "secondhand");
        assert_eq!(normalize_alias("  SECONDHAND "), "secondhand");
    }

    #[test]
    fn blank_input_is_empty() {
        assert_eq!(normalize_alias(" - _ "), "");
    }
}

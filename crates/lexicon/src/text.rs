use unicode_segmentation::UnicodeSegmentation;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "of", "or", "and", "to", "in",
    "on", "at", "by", "for", "with", "from", "as", "that", "this", "it", "its", "any", "some",
    "which", "who", "into", "use", "one", "has", "have", "not", "but", "so", "such",
];

/// Lowercased content words of `text`, stopwords removed, order kept.
#[must_use]
pub fn content_tokens(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(str::to_lowercase)
        .filter(|w| w.chars().any(char::is_alphanumeric) && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Loose morphological match: equal, or sharing a prefix of at least
/// `min_prefix` characters ("plumber" / "plumbing").
#[must_use]
pub fn shares_stem(a: &str, b: &str, min_prefix: usize) -> bool {
    if a == b {
        return true;
    }
    let common = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count();
    common >= min_prefix
}

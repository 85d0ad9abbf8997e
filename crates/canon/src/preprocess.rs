//! Deterministic, source-free term normalization.
//!
//! Every stage is total: input a dictionary does not know passes through
//! unchanged, so [`normalize`] cannot fail.

use once_cell::sync::Lazy;
use std::collections::HashMap;

pub use concord_registry::normalize_alias as compact_form;

static ABBREVIATIONS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("2nd hand", "second hand"),
        ("a/c", "air conditioner"),
        ("ac", "air conditioner"),
        ("apt", "apartment"),
        ("approx", "approximately"),
        ("bhk", "bedroom hall kitchen"),
        ("dr", "doctor"),
        ("doc", "doctor"),
        ("eng", "engineer"),
        ("fridge", "refrigerator"),
        ("govt", "government"),
        ("hp", "horsepower"),
        ("mob", "mobile"),
        ("pg", "paying guest"),
        ("reqd", "required"),
        ("sec hand", "second hand"),
        ("tv", "television"),
        ("w/", "with"),
        ("w/o", "without"),
        ("yr", "year"),
        ("yrs", "years"),
    ])
});

static MULTI_WORD: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("barely used", "used"),
        ("gently used", "used"),
        ("hardly used", "used"),
        ("lightly used", "used"),
        ("slightly used", "used"),
        ("brand new", "new"),
        ("never used", "new"),
        ("sealed pack", "new"),
        ("box packed", "new"),
        ("cell phone", "mobile phone"),
        ("smart phone", "smartphone"),
    ])
});

static SPELLING: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("aluminium", "aluminum"),
        ("centre", "center"),
        ("colour", "color"),
        ("colours", "colors"),
        ("favourite", "favorite"),
        ("grey", "gray"),
        ("jewellery", "jewelry"),
        ("litre", "liter"),
        ("metre", "meter"),
        ("organisation", "organization"),
        ("programme", "program"),
        ("tyre", "tire"),
        ("tyres", "tires"),
    ])
});

static DEMONYMS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("american", "united states"),
        ("australian", "australia"),
        ("bangladeshi", "bangladesh"),
        ("british", "united kingdom"),
        ("canadian", "canada"),
        ("chinese", "china"),
        ("french", "france"),
        ("german", "germany"),
        ("indian", "india"),
        ("japanese", "japan"),
        ("nepali", "nepal"),
        ("pakistani", "pakistan"),
        ("sri lankan", "sri lanka"),
    ])
});

/// Attribute keys under which a demonym names a country.
const ORIGIN_KEYS: &[&str] = &["nationality", "origin", "country", "citizenship", "nation"];

static MAX_ABBREVIATION_TOKENS: Lazy<usize> = Lazy::new(|| max_tokens(&ABBREVIATIONS));
static MAX_MULTI_WORD_TOKENS: Lazy<usize> = Lazy::new(|| max_tokens(&MULTI_WORD));
static MAX_DEMONYM_TOKENS: Lazy<usize> = Lazy::new(|| max_tokens(&DEMONYMS));

fn max_tokens(dict: &HashMap<&'static str, &'static str>) -> usize {
    dict.keys()
        .map(|k| k.split_whitespace().count())
        .max()
        .unwrap_or(1)
}

/// True when `attribute_key` asks for a country or origin.
#[must_use]
pub fn is_origin_key(attribute_key: &str) -> bool {
    attribute_key
        .to_lowercase()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .any(|token| ORIGIN_KEYS.contains(&token))
}

/// Normalizes a free-text attribute value.
///
/// Stages, in order: lowercase and whitespace collapse, abbreviation
/// expansion, multi-word reduction, spelling-variant folding, and demonym
/// resolution when `attribute_key` is origin-like.
#[must_use]
pub fn normalize(term: &str, attribute_key: Option<&str>) -> String {
    let tokens: Vec<String> = term
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut tokens = replace_phrases(tokens, &ABBREVIATIONS, *MAX_ABBREVIATION_TOKENS);
    // Reductions can expose a new phrase ("gently barely used"); run to a fixpoint.
    loop {
        let reduced = replace_phrases(tokens.clone(), &MULTI_WORD, *MAX_MULTI_WORD_TOKENS);
        if reduced == tokens {
            break;
        }
        tokens = reduced;
    }
    let tokens: Vec<String> = tokens
        .into_iter()
        .map(|t| SPELLING.get(t.as_str()).map_or(t, |s| (*s).to_string()))
        .collect();
    let tokens = if attribute_key.is_some_and(is_origin_key) {
        replace_phrases(tokens, &DEMONYMS, *MAX_DEMONYM_TOKENS)
    } else {
        tokens
    };

    tokens.join(" ")
}

/// Longest-match phrase substitution over whitespace tokens.
fn replace_phrases(
    tokens: Vec<String>,
    dict: &HashMap<&'static str, &'static str>,
    max_len: usize,
) -> Vec<String> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let longest = max_len.min(tokens.len() - i);
        let hit = (1..=longest).rev().find_map(|len| {
            let phrase = tokens[i..i + len].join(" ");
            dict.get(phrase.as_str()).map(|replacement| (len, *replacement))
        });
        match hit {
            Some((len, replacement)) => {
                out.extend(replacement.split_whitespace().map(str::to_string));
                i += len;
            }
            None => {
                out.push(tokens[i].clone());
                i += 1;
            }
        }
    }
    out
}

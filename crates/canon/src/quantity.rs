//! Free-text quantities: "around 60k", "rs 80,000", "2-3 lakh", "15 km".

use concord_protocol::NumericValue;
use once_cell::sync::Lazy;
use regex::Regex;

const MAGNITUDE: &str = r"k|thousand|lakhs?|lacs?|crores?|cr|mn|million";
const NUMBER: &str = r"\d[\d,]*(?:\.\d+)?";

static QUANTITY_RE: Lazy<Option<Regex>> = Lazy::new(|| {
    let pattern = format!(
        r"^(?:(?P<marker>around|about|approximately|approx\.?|roughly|nearly|circa|~)\s*)?(?:(?P<currency>rs\.?|inr|₹|\$|usd)\s*)?(?P<num>{NUMBER})\s*(?:(?P<mag>{MAGNITUDE})\b)?(?:\s*(?:-|to)\s*(?P<num2>{NUMBER})\s*(?:(?P<mag2>{MAGNITUDE})\b)?)?\s*(?P<unit>[a-z]+)?\s*(?P<tail>ish|approx|or so)?$"
    );
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(err) => {
            log::error!("Quantity pattern failed to compile: {err}");
            None
        }
    }
});

/// A parsed amount with its unit and hedge.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: NumericValue,
    pub unit: Option<String>,
    pub approximate: bool,
}

fn magnitude(suffix: &str) -> f64 {
    match suffix {
        "k" | "thousand" => 1e3,
        "lakh" | "lakhs" | "lac" | "lacs" => 1e5,
        "mn" | "million" => 1e6,
        "cr" | "crore" | "crores" => 1e7,
        _ => 1.0,
    }
}

fn currency_unit(prefix: &str) -> &'static str {
    match prefix.trim_end_matches('.') {
        "$" | "usd" => "usd",
        _ => "inr",
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

/// Parses a quantity phrase. Returns `None` when the text is not a quantity.
///
/// A magnitude given only on the upper end of a range applies to both ends
/// ("2-3 lakh"). Hedges before or after the number mark it approximate.
#[must_use]
pub fn parse_quantity(text: &str) -> Option<Quantity> {
    let re = QUANTITY_RE.as_ref()?;
    let text = text.trim().to_lowercase();
    let caps = re.captures(&text)?;

    let mag = caps.name("mag").map(|m| m.as_str());
    let mag2 = caps.name("mag2").map(|m| m.as_str());
    let first = parse_number(caps.name("num")?.as_str())?;

    let value = match caps.name("num2") {
        Some(num2) => {
            let second = parse_number(num2.as_str())?;
            let upper = mag2.map_or(1.0, magnitude);
            let lower = mag.map_or(upper, magnitude);
            let (lo, hi) = (first * lower, second * upper);
            NumericValue::Pair([lo.min(hi), lo.max(hi)])
        }
        None => NumericValue::Scalar(first * mag.map_or(1.0, magnitude)),
    };

    let unit = caps
        .name("currency")
        .map(|c| currency_unit(c.as_str()).to_string())
        .or_else(|| caps.name("unit").map(|u| u.as_str().to_string()));
    let approximate = caps.name("marker").is_some() || caps.name("tail").is_some();

    Some(Quantity {
        value,
        unit,
        approximate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hedged_thousands() {
        let q = parse_quantity("around 60k").unwrap();
        assert_eq!(q.value, NumericValue::Scalar(60_000.0));
        assert!(q.approximate);
        assert_eq!(q.unit, None);
    }

    #[test]
    fn currency_prefix_sets_unit() {
        let q = parse_quantity("Rs. 80,000").unwrap();
        assert_eq!(q.value, NumericValue::Scalar(80_000.0));
        assert_eq!(q.unit.as_deref(), Some("inr"));
        assert!(!q.approximate);
    }

    #[test]
    fn range_shares_trailing_magnitude() {
        let q = parse_quantity("2-3 lakh").unwrap();
        assert_eq!(q.value, NumericValue::Pair([200_000.0, 300_000.0]));
    }

    #[test]
    fn unit_is_not_mistaken_for_magnitude() {
        let q = parse_quantity("15km").unwrap();
        assert_eq!(q.value, NumericValue::Scalar(15.0));
        assert_eq!(q.unit.as_deref(), Some("km"));
    }

    #[test]
    fn trailing_hedge_marks_approximate() {
        let q = parse_quantity("5 years or so").unwrap();
        assert_eq!(q.unit.as_deref(), Some("years"));
        assert!(q.approximate);
    }

    #[test]
    fn non_quantities_are_rejected() {
        assert_eq!(parse_quantity("used"), None);
        assert_eq!(parse_quantity(""), None);
        assert_eq!(parse_quantity("about town"), None);
    }
}

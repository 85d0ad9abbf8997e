use concord_protocol::{BoundedAttribute, NumericConstraints};
use once_cell::sync::Lazy;
use std::collections::HashMap;

static UNIT_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let groups: &[(&str, &[&str])] = &[
        ("inr", &["inr", "rs", "rs.", "rupee", "rupees", "₹"]),
        ("usd", &["usd", "$", "dollar", "dollars"]),
        ("km", &["km", "kms", "kilometer", "kilometers", "kilometre", "kilometres"]),
        ("m", &["m", "meter", "meters", "metre", "metres"]),
        ("kg", &["kg", "kgs", "kilogram", "kilograms"]),
        ("gb", &["gb", "gig", "gigs", "gigabyte", "gigabytes"]),
        ("tb", &["tb", "terabyte", "terabytes"]),
        ("year", &["year", "years", "yr", "yrs"]),
        ("month", &["month", "months", "mo", "mos"]),
        ("day", &["day", "days"]),
        ("hour", &["hour", "hours", "hr", "hrs"]),
        ("sqft", &["sqft", "sq ft", "square feet", "square foot"]),
    ];
    groups
        .iter()
        .flat_map(|(canonical, aliases)| aliases.iter().map(move |a| (*a, *canonical)))
        .collect()
});

/// Canonical spelling of a unit; unknown units are only lowercased.
#[must_use]
pub fn fold_unit(unit: &str) -> String {
    let unit = unit.trim().to_lowercase();
    UNIT_ALIASES
        .get(unit.as_str())
        .map_or(unit, |canonical| (*canonical).to_string())
}

/// Units agree after folding; a missing unit on either side agrees with anything.
#[must_use]
pub fn units_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => fold_unit(a) == fold_unit(b),
        _ => true,
    }
}

fn satisfies(required: &BoundedAttribute, offered: &BoundedAttribute) -> bool {
    units_compatible(required.unit.as_deref(), offered.unit.as_deref())
        && required.interval.overlaps(&offered.interval)
}

/// First required numeric bound the offer fails, described for match reports.
///
/// A bound is met when the offer states the same `(axis, type)` in a
/// compatible unit and the two intervals overlap. Approximate values on
/// either side are widened by `tolerance` first.
#[must_use]
pub fn first_unmet(
    required: &NumericConstraints,
    offered: &NumericConstraints,
    tolerance: f64,
) -> Option<String> {
    if required.is_empty() {
        return None;
    }
    let offered = offered.intervals(tolerance);
    for (key, bound) in required.intervals(tolerance) {
        match offered.get(&key) {
            None => return Some(format!("{}.{} not stated", key.axis, key.kind)),
            Some(offer) if !satisfies(&bound, offer) => {
                return Some(format!(
                    "{}.{}: offered [{}, {}] outside required [{}, {}]",
                    key.axis,
                    key.kind,
                    offer.interval.lo,
                    offer.interval.hi,
                    bound.interval.lo,
                    bound.interval.hi
                ));
            }
            Some(_) => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_protocol::{Axis, Constraint, NumericValue};
    use pretty_assertions::assert_eq;

    fn max_price(value: f64, unit: &str) -> NumericConstraints {
        let mut c = NumericConstraints::default();
        c.max.insert(
            Axis::Cost,
            vec![Constraint::new("price", NumericValue::Scalar(value)).unit(unit)],
        );
        c
    }

    fn exact_price(value: f64, unit: &str) -> NumericConstraints {
        let mut c = NumericConstraints::default();
        c.range.insert(
            Axis::Cost,
            vec![Constraint::new("Price", NumericValue::Pair([value, value])).unit(unit)],
        );
        c
    }

    #[test]
    fn folds_unit_aliases() {
        assert_eq!(fold_unit("Rs"), "inr");
        assert_eq!(fold_unit("KMS"), "km");
        assert_eq!(fold_unit("furlong"), "furlong");
        assert!(units_compatible(Some("rupees"), Some("INR")));
        assert!(units_compatible(None, Some("usd")));
        assert!(!units_compatible(Some("usd"), Some("inr")));
    }

    #[test]
    fn overlapping_price_is_met() {
        let reason = first_unmet(&max_price(80_000.0, "inr"), &exact_price(75_000.0, "rs"), 0.1);
        assert_eq!(reason, None);
    }

    #[test]
    fn price_above_budget_is_unmet() {
        let reason = first_unmet(
            &max_price(80_000.0, "inr"),
            &exact_price(95_000.0, "inr"),
            0.1,
        );
        assert!(reason.is_some_and(|r| r.starts_with("cost.price")));
    }

    #[test]
    fn unit_mismatch_is_unmet() {
        let reason = first_unmet(&max_price(1_000.0, "usd"), &exact_price(900.0, "inr"), 0.1);
        assert!(reason.is_some());
    }

    #[test]
    fn approximate_budget_stretches() {
        let mut budget = NumericConstraints::default();
        budget.max.insert(
            Axis::Cost,
            vec![Constraint::new("price", NumericValue::Scalar(60_000.0)).approximate(true)],
        );
        assert_eq!(first_unmet(&budget, &exact_price(65_000.0, "inr"), 0.1), None);
        assert!(first_unmet(&budget, &exact_price(67_000.0, "inr"), 0.1).is_some());
    }

    #[test]
    fn missing_offer_is_unmet() {
        let reason = first_unmet(&max_price(10.0, "inr"), &NumericConstraints::default(), 0.1);
        assert_eq!(reason.as_deref(), Some("cost.price not stated"));
    }
}

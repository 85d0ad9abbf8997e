use crate::implies::SemanticImplies;
use crate::numeric::first_unmet;
use concord_canon::MatchingConfig;
use concord_protocol::{AttributeBag, Intent, Item, Listing, LocationMode, Term};
use concord_registry::SynonymRegistry;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Matching stages, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Intent,
    Subintent,
    Domain,
    Items,
    Preferences,
    Location,
}

impl Gate {
    pub const ALL: [Self; 6] = [
        Self::Intent,
        Self::Subintent,
        Self::Domain,
        Self::Items,
        Self::Preferences,
        Self::Location,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intent => "intent",
            Self::Subintent => "subintent",
            Self::Domain => "domain",
            Self::Items => "items",
            Self::Preferences => "preferences",
            Self::Location => "location",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trace of one evaluation: the gates that ran and why the last one failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReport {
    pub matched: bool,
    pub evaluated: Vec<Gate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<Gate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

type GateResult = std::result::Result<(), String>;

/// Decides whether a candidate listing satisfies a requester. Asymmetric:
/// `matches(a, b)` and `matches(b, a)` are separate questions.
#[derive(Clone)]
pub struct MatchingEngine {
    implies: SemanticImplies,
    tolerance: f64,
}

impl MatchingEngine {
    pub fn new(registry: Arc<dyn SynonymRegistry>, config: &MatchingConfig) -> Self {
        Self {
            implies: SemanticImplies::new(registry, config.min_prefix),
            tolerance: config.approximate_tolerance,
        }
    }

    #[must_use]
    pub fn matches(&self, requester: &Listing, candidate: &Listing) -> bool {
        self.evaluate(requester, candidate).matched
    }

    /// Runs the gates in order and stops at the first failure.
    #[must_use]
    pub fn evaluate(&self, requester: &Listing, candidate: &Listing) -> MatchReport {
        let mut evaluated = Vec::with_capacity(Gate::ALL.len());
        for gate in Gate::ALL {
            evaluated.push(gate);
            if let Err(reason) = self.check(gate, requester, candidate) {
                log::debug!(
                    "{} vs {}: failed {gate}: {reason}",
                    requester.id.as_deref().unwrap_or("requester"),
                    candidate.id.as_deref().unwrap_or("candidate"),
                );
                return MatchReport {
                    matched: false,
                    evaluated,
                    failed: Some(gate),
                    reason: Some(reason),
                };
            }
        }
        MatchReport {
            matched: true,
            evaluated,
            failed: None,
            reason: None,
        }
    }

    fn check(&self, gate: Gate, requester: &Listing, candidate: &Listing) -> GateResult {
        match gate {
            Gate::Intent => check_intent(requester, candidate),
            Gate::Subintent => check_subintent(requester, candidate),
            Gate::Domain => check_domain(requester, candidate),
            Gate::Items => self.check_items(requester, candidate),
            Gate::Preferences => self.check_preferences(requester, candidate),
            Gate::Location => check_location(requester, candidate),
        }
    }

    fn check_items(&self, requester: &Listing, candidate: &Listing) -> GateResult {
        let offered: Vec<&Item> = candidate
            .items
            .iter()
            .filter(|item| !self.is_excluded(item, &requester.item_exclusions))
            .collect();

        for (idx, wanted) in requester.items.iter().enumerate() {
            if !offered.iter().any(|item| self.item_satisfies(item, wanted)) {
                return Err(format!(
                    "no candidate item satisfies items[{idx}] ({})",
                    wanted.item_type.text()
                ));
            }
        }
        Ok(())
    }

    fn is_excluded(&self, item: &Item, exclusions: &[Term]) -> bool {
        exclusions.iter().any(|excluded| {
            self.implies.implies(&item.item_type, excluded)
                || item
                    .categorical
                    .values()
                    .any(|value| self.implies.implies(value, excluded))
        })
    }

    fn item_satisfies(&self, offered: &Item, wanted: &Item) -> bool {
        self.implies.implies(&offered.item_type, &wanted.item_type)
            && wanted.categorical.iter().all(|(key, value)| {
                offered
                    .categorical
                    .get(key)
                    .is_some_and(|have| self.implies.implies(have, value))
            })
            && first_unmet(&wanted.numeric, &offered.numeric, self.tolerance).is_none()
    }

    fn check_preferences(&self, requester: &Listing, candidate: &Listing) -> GateResult {
        self.preferences_met(
            &requester.other_party_preferences,
            &requester.other_party_exclusions,
            &candidate.self_attributes,
        )?;
        if requester.intent == Intent::Mutual {
            self.preferences_met(
                &candidate.other_party_preferences,
                &candidate.other_party_exclusions,
                &requester.self_attributes,
            )
            .map_err(|reason| format!("reverse direction: {reason}"))?;
        }
        Ok(())
    }

    fn preferences_met(
        &self,
        wanted: &AttributeBag,
        exclusions: &[Term],
        offered: &AttributeBag,
    ) -> GateResult {
        for (key, value) in &wanted.categorical {
            match offered.categorical.get(key) {
                None => return Err(format!("'{key}' not stated")),
                Some(have) if !self.implies.implies(have, value) => {
                    return Err(format!(
                        "'{key}': '{}' does not satisfy '{}'",
                        have.text(),
                        value.text()
                    ));
                }
                Some(_) => {}
            }
        }
        if let Some(reason) = first_unmet(&wanted.numeric, &offered.numeric, self.tolerance) {
            return Err(reason);
        }
        for (key, have) in &offered.categorical {
            if let Some(excluded) = exclusions.iter().find(|ex| self.implies.implies(have, ex)) {
                return Err(format!("'{key}': '{}' is excluded", excluded.text()));
            }
        }
        Ok(())
    }
}

fn check_intent(requester: &Listing, candidate: &Listing) -> GateResult {
    if requester.intent == candidate.intent {
        Ok(())
    } else {
        Err(format!("{} vs {}", requester.intent, candidate.intent))
    }
}

fn check_subintent(requester: &Listing, candidate: &Listing) -> GateResult {
    let expected = requester.subintent.inverse().unwrap_or(requester.subintent);
    if candidate.subintent == expected {
        Ok(())
    } else {
        Err(format!(
            "{} needs {expected}, got {}",
            requester.subintent, candidate.subintent
        ))
    }
}

fn folded(values: &BTreeSet<String>) -> BTreeSet<String> {
    values
        .iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn check_domain(requester: &Listing, candidate: &Listing) -> GateResult {
    let (field, ours, theirs) = match requester.intent {
        Intent::Mutual => ("category", &requester.category, &candidate.category),
        Intent::Product | Intent::Service => ("domain", &requester.domain, &candidate.domain),
    };
    if folded(ours).is_disjoint(&folded(theirs)) {
        Err(format!("no shared {field}"))
    } else {
        Ok(())
    }
}

fn check_location(requester: &Listing, candidate: &Listing) -> GateResult {
    let Some(wanted) = &requester.location else {
        return Ok(());
    };
    match wanted.mode {
        LocationMode::NearMe | LocationMode::Global => Ok(()),
        LocationMode::Explicit => {
            let want = wanted.name.as_deref().map(|n| n.trim().to_lowercase());
            let have = candidate
                .location
                .as_ref()
                .and_then(|l| l.name.as_deref())
                .map(|n| n.trim().to_lowercase());
            match (want, have) {
                (Some(want), Some(have)) if want == have => Ok(()),
                (Some(want), Some(have)) => Err(format!("'{have}' is not '{want}'")),
                _ => Err("candidate names no location".to_string()),
            }
        }
        LocationMode::Route => {
            let both = wanted.has_route()
                && candidate.location.as_ref().is_some_and(|l| l.has_route());
            if both {
                Ok(())
            } else {
                Err("route needs origin and destination on both sides".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_protocol::{Location, Subintent};
    use concord_registry::InMemoryRegistry;
    use pretty_assertions::assert_eq;

    fn engine() -> MatchingEngine {
        MatchingEngine::new(Arc::new(InMemoryRegistry::new()), &MatchingConfig::default())
    }

    fn product(subintent: Subintent, item: &str) -> Listing {
        let mut listing = Listing::new(Intent::Product, subintent);
        listing.domain.insert("Electronics".to_string());
        listing.items.push(Item::new(item));
        listing
    }

    #[test]
    fn intent_mismatch_stops_at_first_gate() {
        let buyer = product(Subintent::Buy, "laptop");
        let mut seeker = Listing::new(Intent::Service, Subintent::Provide);
        seeker.domain.insert("electronics".to_string());
        let report = engine().evaluate(&buyer, &seeker);
        assert_eq!(report.evaluated, vec![Gate::Intent]);
        assert_eq!(report.failed, Some(Gate::Intent));
    }

    #[test]
    fn two_buyers_do_not_match() {
        let report = engine().evaluate(
            &product(Subintent::Buy, "laptop"),
            &product(Subintent::Buy, "laptop"),
        );
        assert_eq!(report.failed, Some(Gate::Subintent));
    }

    #[test]
    fn domains_compare_case_insensitively() {
        let buyer = product(Subintent::Buy, "laptop");
        let mut seller = product(Subintent::Sell, "laptop");
        seller.domain = BTreeSet::from(["electronics ".to_string()]);
        assert!(engine().matches(&buyer, &seller));

        seller.domain = BTreeSet::from(["furniture".to_string()]);
        assert_eq!(engine().evaluate(&buyer, &seller).failed, Some(Gate::Domain));
    }

    #[test]
    fn excluded_items_are_skipped() {
        let mut buyer = product(Subintent::Buy, "laptop");
        buyer.item_exclusions.push(Term::from("refurbished"));
        let mut seller = product(Subintent::Sell, "laptop");
        seller.items[0] = Item::new("laptop").with("condition", "refurbished");
        assert_eq!(engine().evaluate(&buyer, &seller).failed, Some(Gate::Items));
    }

    #[test]
    fn missing_categorical_key_fails_item() {
        let mut buyer = product(Subintent::Buy, "laptop");
        buyer.items[0] = Item::new("laptop").with("brand", "dell");
        let seller = product(Subintent::Sell, "laptop");
        assert!(!engine().matches(&buyer, &seller));
    }

    #[test]
    fn location_modes() {
        let mut buyer = product(Subintent::Buy, "laptop");
        let mut seller = product(Subintent::Sell, "laptop");

        buyer.location = Some(Location::explicit("Pune"));
        seller.location = Some(Location::explicit("pune"));
        assert!(engine().matches(&buyer, &seller));

        seller.location = Some(Location::explicit("Mumbai"));
        assert_eq!(engine().evaluate(&buyer, &seller).failed, Some(Gate::Location));

        seller.location = None;
        assert!(!engine().matches(&buyer, &seller));

        buyer.location = Some(Location::route("Pune", "Mumbai"));
        seller.location = Some(Location::route("Pune", "Goa"));
        assert!(engine().matches(&buyer, &seller));
        seller.location = Some(Location::explicit("Pune"));
        assert!(!engine().matches(&buyer, &seller));

        buyer.location = None;
        assert!(engine().matches(&buyer, &seller));
    }

    #[test]
    fn other_party_exclusions_reject_candidates() {
        let mut seeker = Listing::new(Intent::Service, Subintent::Seek);
        seeker.domain.insert("home".to_string());
        seeker.items.push(Item::new("plumber"));
        seeker.other_party_exclusions.push(Term::from("agency"));
        let mut provider = Listing::new(Intent::Service, Subintent::Provide);
        provider.domain.insert("home".to_string());
        provider.items.push(Item::new("plumber"));
        assert!(engine().matches(&seeker, &provider));

        provider.self_attributes = AttributeBag::default().with("provider_type", "Agency");
        let report = engine().evaluate(&seeker, &provider);
        assert_eq!(report.failed, Some(Gate::Preferences));
    }
}

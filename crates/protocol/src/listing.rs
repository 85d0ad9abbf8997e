use crate::concept::Term;
use crate::error::{ProtocolError, Result};
use crate::numeric::NumericConstraints;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type ListingId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Product,
    Service,
    Mutual,
}

impl Intent {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Service => "service",
            Self::Mutual => "mutual",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Subintent {
    Buy,
    Sell,
    Seek,
    Provide,
    Connect,
}

impl Subintent {
    /// Counterpart a product/service listing must face. `Connect` has none:
    /// mutual listings pair with an equal subintent instead.
    #[must_use]
    pub const fn inverse(self) -> Option<Self> {
        match self {
            Self::Buy => Some(Self::Sell),
            Self::Sell => Some(Self::Buy),
            Self::Seek => Some(Self::Provide),
            Self::Provide => Some(Self::Seek),
            Self::Connect => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Seek => "seek",
            Self::Provide => "provide",
            Self::Connect => "connect",
        }
    }

    const fn allowed_for(self, intent: Intent) -> bool {
        matches!(
            (intent, self),
            (Intent::Product, Self::Buy | Self::Sell)
                | (Intent::Service, Self::Seek | Self::Provide)
                | (Intent::Mutual, Self::Connect)
        )
    }
}

impl fmt::Display for Subintent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One thing being offered or asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Item {
    #[serde(rename = "type")]
    pub item_type: Term,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categorical: BTreeMap<String, Term>,

    #[serde(flatten)]
    pub numeric: NumericConstraints,
}

impl Item {
    pub fn new(item_type: impl Into<Term>) -> Self {
        Self {
            item_type: item_type.into(),
            categorical: BTreeMap::new(),
            numeric: NumericConstraints::default(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Term>) -> Self {
        self.categorical.insert(key.to_string(), value.into());
        self
    }
}

/// Categorical and numeric attributes describing a party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AttributeBag {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categorical: BTreeMap<String, Term>,

    #[serde(flatten)]
    pub numeric: NumericConstraints,
}

impl AttributeBag {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categorical.is_empty() && self.numeric.is_empty()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<Term>) -> Self {
        self.categorical.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LocationMode {
    Explicit,
    NearMe,
    Global,
    Route,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    pub mode: LocationMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl Location {
    pub fn explicit(name: impl Into<String>) -> Self {
        Self {
            mode: LocationMode::Explicit,
            name: Some(name.into()),
            origin: None,
            destination: None,
        }
    }

    pub fn route(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            mode: LocationMode::Route,
            name: None,
            origin: Some(origin.into()),
            destination: Some(destination.into()),
        }
    }

    #[must_use]
    pub fn has_route(&self) -> bool {
        non_blank(self.origin.as_deref()) && non_blank(self.destination.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Unit being matched: produced by extraction, enriched in place by the
/// canonicalizer, read-only to the matching engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Listing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ListingId>,

    pub intent: Intent,
    pub subintent: Subintent,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub domain: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub category: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<Item>,

    #[serde(default, skip_serializing_if = "AttributeBag::is_empty")]
    pub other_party_preferences: AttributeBag,

    #[serde(default, skip_serializing_if = "AttributeBag::is_empty")]
    pub self_attributes: AttributeBag,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// Item types or values the requester refuses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub item_exclusions: Vec<Term>,

    /// Counterpart attributes the requester refuses
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_party_exclusions: Vec<Term>,
}

/// Structured draft as returned by the extraction service, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawListing(pub serde_json::Value);

impl Listing {
    pub fn new(intent: Intent, subintent: Subintent) -> Self {
        Self {
            id: None,
            intent,
            subintent,
            domain: BTreeSet::new(),
            category: BTreeSet::new(),
            items: Vec::new(),
            other_party_preferences: AttributeBag::default(),
            self_attributes: AttributeBag::default(),
            location: None,
            item_exclusions: Vec::new(),
            other_party_exclusions: Vec::new(),
        }
    }

    /// Parses and validates an extraction draft.
    pub fn from_raw(raw: RawListing) -> Result<Self> {
        let listing: Self = serde_json::from_value(raw.0)
            .map_err(|err| ProtocolError::malformed("listing", err.to_string()))?;
        listing.validate()?;
        Ok(listing)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        Self::from_raw(RawListing(value))
    }

    /// Checks the structural contract the matching engine relies on.
    pub fn validate(&self) -> Result<()> {
        if !self.subintent.allowed_for(self.intent) {
            return Err(ProtocolError::malformed(
                "subintent",
                format!(
                    "'{}' is not valid for intent '{}'",
                    self.subintent, self.intent
                ),
            ));
        }

        match self.intent {
            Intent::Product | Intent::Service => {
                if self.domain.iter().all(|d| d.trim().is_empty()) {
                    return Err(ProtocolError::malformed(
                        "domain",
                        format!("{} listings need at least one domain", self.intent),
                    ));
                }
                if self.items.is_empty() {
                    return Err(ProtocolError::malformed(
                        "items",
                        format!("{} listings need at least one item", self.intent),
                    ));
                }
            }
            Intent::Mutual => {
                if self.category.iter().all(|c| c.trim().is_empty()) {
                    return Err(ProtocolError::malformed(
                        "category",
                        "mutual listings need at least one category",
                    ));
                }
            }
        }

        for (idx, item) in self.items.iter().enumerate() {
            if item.item_type.text().trim().is_empty() {
                return Err(ProtocolError::malformed(
                    format!("items[{idx}].type"),
                    "item type is empty",
                ));
            }
            validate_numeric(&format!("items[{idx}]"), &item.numeric)?;
        }
        validate_numeric("other_party_preferences", &self.other_party_preferences.numeric)?;
        validate_numeric("self_attributes", &self.self_attributes.numeric)?;

        if let Some(location) = &self.location {
            if location.mode == LocationMode::Explicit && !non_blank(location.name.as_deref()) {
                return Err(ProtocolError::malformed(
                    "location.name",
                    "explicit location needs a name",
                ));
            }
        }

        Ok(())
    }
}

fn validate_numeric(scope: &str, numeric: &NumericConstraints) -> Result<()> {
    for (axis, constraint) in numeric.iter_all() {
        if constraint.kind.trim().is_empty() {
            return Err(ProtocolError::malformed(
                format!("{scope}.{axis}"),
                "constraint type is empty",
            ));
        }
        if !constraint.value.is_finite() {
            return Err(ProtocolError::malformed(
                format!("{scope}.{axis}.{}", constraint.kind),
                "constraint value is not a finite number",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::Axis;
    use pretty_assertions::assert_eq;

    const SMARTPHONE_BUYER: &str = r#"{
        "intent": "product",
        "subintent": "buy",
        "domain": ["electronics"],
        "items": [{
            "type": "smartphone",
            "categorical": {"condition": "used"},
            "max": {"cost": [{"type": "price", "value": 80000, "unit": "inr"}]}
        }],
        "location": {"mode": "near_me"}
    }"#;

    #[test]
    fn parses_wire_listing() {
        let listing = Listing::from_json(SMARTPHONE_BUYER).unwrap();
        assert_eq!(listing.intent, Intent::Product);
        assert_eq!(listing.items.len(), 1);
        let item = &listing.items[0];
        assert_eq!(item.item_type.text(), "smartphone");
        assert_eq!(item.categorical["condition"].text(), "used");
        assert_eq!(item.numeric.max[&Axis::Cost][0].value.high(), 80_000.0);
        assert_eq!(
            listing.location.as_ref().map(|l| l.mode),
            Some(LocationMode::NearMe)
        );
    }

    #[test]
    fn missing_intent_is_malformed() {
        let err = Listing::from_json(r#"{"subintent": "buy"}"#).unwrap_err();
        assert_eq!(err.code(), "malformed_listing");
    }

    #[test]
    fn subintent_must_fit_intent() {
        let mut listing = Listing::new(Intent::Mutual, Subintent::Buy);
        listing.category.insert("roommate".to_string());
        let err = listing.validate().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedListing { ref field, .. } if field == "subintent"
        ));
    }

    #[test]
    fn product_listing_needs_items_and_domain() {
        let mut listing = Listing::new(Intent::Product, Subintent::Sell);
        assert!(listing.validate().is_err());
        listing.domain.insert("electronics".to_string());
        assert!(listing.validate().is_err());
        listing.items.push(Item::new("laptop"));
        assert!(listing.validate().is_ok());
    }

    #[test]
    fn subintent_inverses_pair_up() {
        assert_eq!(Subintent::Buy.inverse(), Some(Subintent::Sell));
        assert_eq!(Subintent::Provide.inverse(), Some(Subintent::Seek));
        assert_eq!(Subintent::Connect.inverse(), None);
    }
}

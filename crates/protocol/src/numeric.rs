use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The ten fixed numeric axes a constraint can be keyed by.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Identity,
    Capacity,
    Performance,
    Quality,
    Quantity,
    Time,
    Space,
    Cost,
    Mode,
    Skill,
}

impl Axis {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Capacity => "capacity",
            Self::Performance => "performance",
            Self::Quality => "quality",
            Self::Quantity => "quantity",
            Self::Time => "time",
            Self::Space => "space",
            Self::Cost => "cost",
            Self::Mode => "mode",
            Self::Skill => "skill",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scalar or `[min, max]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum NumericValue {
    Scalar(f64),
    Pair([f64; 2]),
}

impl NumericValue {
    #[must_use]
    pub fn low(self) -> f64 {
        match self {
            Self::Scalar(v) => v,
            Self::Pair([a, b]) => a.min(b),
        }
    }

    #[must_use]
    pub fn high(self) -> f64 {
        match self {
            Self::Scalar(v) => v,
            Self::Pair([a, b]) => a.max(b),
        }
    }

    #[must_use]
    pub fn is_finite(self) -> bool {
        match self {
            Self::Scalar(v) => v.is_finite(),
            Self::Pair([a, b]) => a.is_finite() && b.is_finite(),
        }
    }
}

/// One numeric bound, e.g. `{ "type": "price", "value": 80000, "unit": "inr" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Constraint {
    /// Attribute measured on the axis ("price", "storage", "experience")
    #[serde(rename = "type")]
    pub kind: String,

    pub value: NumericValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,

    /// Stated with a hedge such as "around" or "approx"
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub approximate: bool,
}

impl Constraint {
    pub fn new(kind: impl Into<String>, value: NumericValue) -> Self {
        Self {
            kind: kind.into(),
            value,
            unit: None,
            approximate: false,
        }
    }

    #[must_use]
    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn approximate(mut self, approximate: bool) -> Self {
        self.approximate = approximate;
        self
    }

    fn widened(&self, tolerance: f64) -> (f64, f64) {
        let (lo, hi) = (self.value.low(), self.value.high());
        if !self.approximate {
            return (lo, hi);
        }
        (lo - lo.abs() * tolerance, hi + hi.abs() * tolerance)
    }
}

pub type AxisConstraints = BTreeMap<Axis, Vec<Constraint>>;

/// The `min` / `max` / `range` constraint axes shared by items and attribute bags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NumericConstraints {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub min: AxisConstraints,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub max: AxisConstraints,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub range: AxisConstraints,
}

/// Closed interval; unbounded sides are infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub const UNBOUNDED: Self = Self {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }

    #[must_use]
    pub fn intersect(&self, other: &Self) -> Self {
        Self {
            lo: self.lo.max(other.lo),
            hi: self.hi.min(other.hi),
        }
    }
}

/// `(axis, type)` pair a bound applies to; `kind` is lowercased.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintKey {
    pub axis: Axis,
    pub kind: String,
}

impl ConstraintKey {
    pub fn new(axis: Axis, kind: &str) -> Self {
        Self {
            axis,
            kind: kind.trim().to_lowercase(),
        }
    }
}

/// Interval a side accepts for one `(axis, type)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedAttribute {
    pub interval: Interval,
    pub unit: Option<String>,
}

impl NumericConstraints {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.is_empty() && self.max.is_empty() && self.range.is_empty()
    }

    pub fn iter_all(&self) -> impl Iterator<Item = (Axis, &Constraint)> {
        [&self.min, &self.max, &self.range]
            .into_iter()
            .flat_map(|axes| {
                axes.iter()
                    .flat_map(|(axis, list)| list.iter().map(move |c| (*axis, c)))
            })
    }

    /// Collapses min/max/range into one interval per `(axis, type)`.
    ///
    /// `tolerance` is the fractional widening applied to approximate values.
    #[must_use]
    pub fn intervals(&self, tolerance: f64) -> BTreeMap<ConstraintKey, BoundedAttribute> {
        let mut out = BTreeMap::new();

        for (axis, list) in &self.min {
            for c in list {
                let (lo, _) = c.widened(tolerance);
                merge_bound(&mut out, *axis, c, Interval { lo, hi: f64::INFINITY });
            }
        }
        for (axis, list) in &self.max {
            for c in list {
                let (_, hi) = c.widened(tolerance);
                merge_bound(&mut out, *axis, c, Interval { lo: f64::NEG_INFINITY, hi });
            }
        }
        for (axis, list) in &self.range {
            for c in list {
                let (lo, hi) = c.widened(tolerance);
                merge_bound(&mut out, *axis, c, Interval { lo, hi });
            }
        }

        out
    }
}

fn merge_bound(
    out: &mut BTreeMap<ConstraintKey, BoundedAttribute>,
    axis: Axis,
    constraint: &Constraint,
    interval: Interval,
) {
    let entry = out
        .entry(ConstraintKey::new(axis, &constraint.kind))
        .or_insert_with(|| BoundedAttribute {
            interval: Interval::UNBOUNDED,
            unit: None,
        });
    entry.interval = entry.interval.intersect(&interval);
    if entry.unit.is_none() {
        entry.unit.clone_from(&constraint.unit);
    }
}

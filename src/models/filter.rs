// src/models/filter.rs

//! Range filters encoded in the listing service's `/filter/` path fragment.
//!
//! A fragment is a comma-separated token list such as
//! `min-price=1000,max-price=1000000,min-sqft=10-sqft,max-sqft=1000-sqft,include=sold-3yr`.
//! Only the three partitioned dimensions are modelled here; other tokens are
//! carried verbatim by [`crate::models::Query`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Marker token asking the service to include recently sold listings.
pub const HISTORY_MARKER: &str = "include=sold-3yr";

/// A partitioned filter dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Price,
    Area,
    Year,
}

impl Dimension {
    /// Split priority: price first, year last.
    pub const PRIORITY: [Dimension; 3] = [Dimension::Price, Dimension::Area, Dimension::Year];

    /// Position in [`Dimension::PRIORITY`].
    pub fn rank(self) -> usize {
        match self {
            Dimension::Price => 0,
            Dimension::Area => 1,
            Dimension::Year => 2,
        }
    }

    fn min_key(self) -> &'static str {
        match self {
            Dimension::Price => "min-price",
            Dimension::Area => "min-sqft",
            Dimension::Year => "min-year-built",
        }
    }

    fn max_key(self) -> &'static str {
        match self {
            Dimension::Price => "max-price",
            Dimension::Area => "max-sqft",
            Dimension::Year => "max-year-built",
        }
    }

    fn unit(self) -> &'static str {
        match self {
            Dimension::Area => "-sqft",
            _ => "",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Price => "price",
            Dimension::Area => "area",
            Dimension::Year => "year",
        };
        f.write_str(name)
    }
}

/// A closed integer interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub min: i64,
    pub max: i64,
}

impl Interval {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> i64 {
        self.max - self.min
    }

    pub fn encloses(&self, other: &Interval) -> bool {
        self.min <= other.min && other.max <= self.max
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Per-dimension optional range constraints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<Interval>,
}

/// Result of tokenizing a fragment: the partitioned filters plus everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ParsedFragment {
    pub filters: FilterSet,
    pub passthrough: Vec<String>,
    pub include_history: bool,
}

impl FilterSet {
    pub fn get(&self, dimension: Dimension) -> Option<Interval> {
        match dimension {
            Dimension::Price => self.price,
            Dimension::Area => self.area,
            Dimension::Year => self.year,
        }
    }

    /// Copy of this set with `dimension` constrained to `interval`.
    pub fn with(mut self, dimension: Dimension, interval: Interval) -> Self {
        let slot = match dimension {
            Dimension::Price => &mut self.price,
            Dimension::Area => &mut self.area,
            Dimension::Year => &mut self.year,
        };
        *slot = Some(interval);
        self
    }

    /// Whether every range here encloses the matching range of `other`.
    pub fn encloses(&self, other: &FilterSet) -> bool {
        Dimension::PRIORITY
            .iter()
            .all(|d| match (self.get(*d), other.get(*d)) {
                (Some(outer), Some(inner)) => outer.encloses(&inner),
                (Some(_), None) => false,
                (None, _) => true,
            })
    }

    /// Parse a filter fragment, ignoring tokens outside the partitioned dimensions.
    pub fn parse(fragment: &str) -> Result<Self> {
        Ok(parse_fragment(fragment)?.filters)
    }

    /// Canonical fragment: dimensions in priority order, then the history marker.
    pub fn serialize(&self) -> String {
        let mut tokens = self.tokens();
        tokens.push(HISTORY_MARKER.to_string());
        tokens.join(",")
    }

    /// Canonical `key=value` tokens for the constrained dimensions.
    pub(crate) fn tokens(&self) -> Vec<String> {
        let mut tokens = Vec::new();
        for dimension in Dimension::PRIORITY {
            if let Some(interval) = self.get(dimension) {
                let unit = dimension.unit();
                tokens.push(format!("{}={}{unit}", dimension.min_key(), interval.min));
                tokens.push(format!("{}={}{unit}", dimension.max_key(), interval.max));
            }
        }
        tokens
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = Dimension::PRIORITY
            .iter()
            .filter_map(|d| self.get(*d).map(|iv| format!("{d}={iv}")))
            .collect();
        if parts.is_empty() {
            f.write_str("unfiltered")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

pub(crate) fn parse_fragment(fragment: &str) -> Result<ParsedFragment> {
    let mut bounds: [(Option<i64>, Option<i64>); 3] = [(None, None); 3];
    let mut parsed = ParsedFragment::default();

    for token in fragment.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if token == HISTORY_MARKER {
            parsed.include_history = true;
            continue;
        }

        let Some((key, value)) = token.split_once('=') else {
            parsed.passthrough.push(token.to_string());
            continue;
        };

        let matched = Dimension::PRIORITY.iter().find_map(|d| {
            if key == d.min_key() {
                Some((*d, true))
            } else if key == d.max_key() {
                Some((*d, false))
            } else {
                None
            }
        });

        let Some((dimension, is_min)) = matched else {
            parsed.passthrough.push(token.to_string());
            continue;
        };

        let value = parse_bound(fragment, dimension, value)?;
        let slot = &mut bounds[dimension.rank()];
        let target = if is_min { &mut slot.0 } else { &mut slot.1 };
        if target.replace(value).is_some() {
            return Err(AppError::malformed(fragment, format!("duplicate '{key}'")));
        }
    }

    for dimension in Dimension::PRIORITY {
        match bounds[dimension.rank()] {
            (None, None) => {}
            (Some(min), Some(max)) => {
                if min > max {
                    return Err(AppError::malformed(
                        fragment,
                        format!("{dimension} minimum {min} exceeds maximum {max}"),
                    ));
                }
                parsed.filters = parsed.filters.with(dimension, Interval::new(min, max));
            }
            _ => {
                return Err(AppError::malformed(
                    fragment,
                    format!("{dimension} has only one bound"),
                ));
            }
        }
    }

    Ok(parsed)
}

/// Parse a bound such as `1000000`, `750k`, `2m` or `1000-sqft`.
fn parse_bound(fragment: &str, dimension: Dimension, raw: &str) -> Result<i64> {
    let value = raw.strip_suffix(dimension.unit()).unwrap_or(raw);
    let lower = value.to_ascii_lowercase();
    let (digits, multiplier) = if let Some(d) = lower.strip_suffix('k') {
        (d, 1_000)
    } else if let Some(d) = lower.strip_suffix('m') {
        (d, 1_000_000)
    } else {
        (lower.as_str(), 1)
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::malformed(
            fragment,
            format!("non-numeric {dimension} bound '{raw}'"),
        ));
    }

    digits
        .parse::<i64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| AppError::malformed(fragment, format!("{dimension} bound '{raw}' overflows")))
}

//! Planning request types.
//!
//! Inputs arrive as loosely typed JSON (coordinates and prices may be numbers
//! or numeric strings), so raw values are kept as [`serde_json::Value`] and
//! parsed by the model builder, which skips or rejects what it cannot read.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PlanError;

/// A physical location in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Key for exact coordinate equality. `-0.0` and `0.0` compare equal.
    pub(crate) fn exact_key(&self) -> (u64, u64) {
        fn bits(value: f64) -> u64 {
            if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() }
        }
        (bits(self.lat), bits(self.lng))
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Placeholder address used when no geocoded address is available.
    pub fn placeholder_address(&self) -> String {
        format!("({}, {})", self.lat, self.lng)
    }
}

impl From<(f64, f64)> for Location {
    fn from((lat, lng): (f64, f64)) -> Self {
        Self { lat, lng }
    }
}

/// Parses a JSON number or numeric string.
pub(crate) fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Unvalidated `{lat, lng}` pair as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLocation {
    #[serde(default)]
    pub lat: Value,
    #[serde(default)]
    pub lng: Value,
}

impl RawLocation {
    pub fn parse(&self) -> Option<Location> {
        let location = Location::new(parse_number(&self.lat)?, parse_number(&self.lng)?);
        location.is_valid().then_some(location)
    }
}

impl From<Location> for RawLocation {
    fn from(location: Location) -> Self {
        Self {
            lat: Value::from(location.lat),
            lng: Value::from(location.lng),
        }
    }
}

/// A store offering priced items, keyed in [`PlanRequest::stores`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreInput {
    #[serde(default)]
    pub lat: Value,
    #[serde(default)]
    pub lng: Value,
    /// Human-readable address. Falls back to the store key when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Item id to price.
    #[serde(default)]
    pub items: BTreeMap<String, Value>,
}

impl StoreInput {
    pub fn at(lat: f64, lng: f64) -> Self {
        Self {
            lat: Value::from(lat),
            lng: Value::from(lng),
            ..Self::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_item(mut self, item_id: impl Into<String>, price: f64) -> Self {
        self.items.insert(item_id.into(), Value::from(price));
        self
    }

    pub fn location(&self) -> Option<Location> {
        RawLocation {
            lat: self.lat.clone(),
            lng: self.lng.clone(),
        }
        .parse()
    }
}

/// A set of interchangeable item ids; exactly one purchase satisfies it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredGroup {
    items: BTreeSet<String>,
}

impl RequiredGroup {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            items: items.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.items.contains(item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    /// Short label made of the first two ids in sorted order.
    pub fn label(&self) -> String {
        if self.items.is_empty() {
            return "empty".to_string();
        }
        self.items
            .iter()
            .take(2)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// A planning request: stores, required groups and the shopper's position.
///
/// Stores are kept in key order, which fixes the order in which locations and
/// task nodes are numbered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    #[serde(default)]
    pub stores: BTreeMap<String, StoreInput>,
    #[serde(default)]
    pub groups: Vec<RequiredGroup>,
    #[serde(default)]
    pub user_loc: Option<RawLocation>,
}

impl PlanRequest {
    pub fn new(user_loc: Location) -> Self {
        Self {
            user_loc: Some(user_loc.into()),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_store(mut self, key: impl Into<String>, store: StoreInput) -> Self {
        self.stores.insert(key.into(), store);
        self
    }

    pub fn with_group<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.push(RequiredGroup::new(items));
        self
    }

    /// Rejects requests with no stores, no groups, or no user location.
    pub fn ensure_complete(&self) -> Result<(), PlanError> {
        if self.stores.is_empty() {
            return Err(PlanError::missing("stores"));
        }
        if self.groups.is_empty() {
            return Err(PlanError::missing("groups"));
        }
        if self.user_loc.is_none() {
            return Err(PlanError::missing("user_loc"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_accepts_numeric_strings() {
        assert_eq!(parse_number(&Value::from(1.5)), Some(1.5));
        assert_eq!(parse_number(&Value::from(" 20000 ")), Some(20000.0));
        assert_eq!(parse_number(&Value::from("abc")), None);
        assert_eq!(parse_number(&Value::Null), None);
    }

    #[test]
    fn test_raw_location_rejects_out_of_range() {
        let raw = RawLocation {
            lat: Value::from(91.0),
            lng: Value::from(0.0),
        };
        assert!(raw.parse().is_none());

        let raw = RawLocation {
            lat: Value::from("10.0"),
            lng: Value::from(106.0),
        };
        assert_eq!(raw.parse(), Some(Location::new(10.0, 106.0)));
    }

    #[test]
    fn test_exact_key_treats_signed_zero_as_equal() {
        assert_eq!(
            Location::new(0.0, 1.0).exact_key(),
            Location::new(-0.0, 1.0).exact_key()
        );
        assert_ne!(
            Location::new(10.0, 106.0).exact_key(),
            Location::new(10.000001, 106.0).exact_key()
        );
    }

    #[test]
    fn test_group_label_uses_first_two_sorted_ids() {
        let group = RequiredGroup::new(["milk_b", "milk_a", "milk_c"]);
        assert_eq!(group.label(), "milk_a_milk_b");
        assert_eq!(RequiredGroup::default().label(), "empty");
    }

    #[test]
    fn test_request_from_json() {
        let json = r#"{
            "stores": {
                "StoreA": {"lat": 10.01, "lng": "106.01", "items": {"milk_a": 20000, "bread_a": "15000"}}
            },
            "groups": [["milk_a"], ["bread_a"]],
            "user_loc": {"lat": 10.0, "lng": 106.0}
        }"#;
        let request = PlanRequest::from_json(json).unwrap();
        assert_eq!(request.stores.len(), 1);
        assert_eq!(request.groups.len(), 2);
        assert!(request.groups[0].contains("milk_a"));
        assert_eq!(
            request.stores["StoreA"].location(),
            Some(Location::new(10.01, 106.01))
        );
        assert!(request.ensure_complete().is_ok());
    }

    #[test]
    fn test_missing_parts_are_reported() {
        let request = PlanRequest::default();
        assert_eq!(
            request.ensure_complete(),
            Err(PlanError::missing("stores"))
        );

        let request = PlanRequest::default().with_store("A", StoreInput::at(1.0, 1.0));
        assert_eq!(request.ensure_complete(), Err(PlanError::missing("groups")));

        let request = request.with_group(["x"]);
        assert_eq!(
            request.ensure_complete(),
            Err(PlanError::missing("user_loc"))
        );
    }
}

//! Conversion of a nearby-store product search into a [`PlanRequest`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PlanError;
use crate::models::{Location, PlanRequest, RawLocation, RequiredGroup, StoreInput, parse_number};

/// A store returned by a nearby-product search.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NearbyStore {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Value,
    #[serde(default)]
    pub lng: Value,
    #[serde(default)]
    pub items: Vec<ProductOffer>,
}

/// The candidates one store offers for a requested product.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductOffer {
    #[serde(default)]
    pub product_name: String,
    /// Units to buy; one when absent or `null`.
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl ProductOffer {
    fn quantity(&self) -> f64 {
        self.quantity.unwrap_or(1.0)
    }
}

/// A matching product. Candidates without a name are ignored; a missing
/// price counts as free.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Value,
}

impl Candidate {
    fn price(&self) -> Option<f64> {
        if self.price.is_null() {
            return Some(0.0);
        }
        parse_number(&self.price)
    }
}

impl NearbyStore {
    fn location(&self) -> Option<Location> {
        RawLocation {
            lat: self.lat.clone(),
            lng: self.lng.clone(),
        }
        .parse()
    }
}

/// Builds a request from search results. The products to buy are those the
/// first store was searched for; each becomes one group whose alternatives are
/// every candidate offered for it.
pub fn request_from_nearby(
    stores: &[NearbyStore],
    user_loc: Location,
) -> Result<PlanRequest, PlanError> {
    let products: Vec<&str> = stores
        .first()
        .map(|store| {
            store
                .items
                .iter()
                .map(|offer| offer.product_name.as_str())
                .filter(|name| !name.trim().is_empty())
                .collect()
        })
        .unwrap_or_default();
    if products.is_empty() {
        return Err(PlanError::missing("stores"));
    }

    let mut request = PlanRequest::new(user_loc);
    let mut alternatives: Vec<BTreeSet<String>> = vec![BTreeSet::new(); products.len()];

    for store in stores {
        let Some(address) = store.address.as_deref().filter(|a| !a.trim().is_empty()) else {
            debug!("skipping store without address");
            continue;
        };
        if store.location().is_none() {
            warn!(store = address, "skipping store with unusable coordinates");
            continue;
        }

        let mut items: BTreeMap<String, Value> = BTreeMap::new();
        for offer in &store.items {
            let Some(product) = products.iter().position(|p| *p == offer.product_name) else {
                continue;
            };
            for candidate in &offer.candidates {
                let Some(name) = candidate.name.as_deref().filter(|n| !n.trim().is_empty()) else {
                    continue;
                };
                let Some(price) = candidate.price() else {
                    warn!(store = address, item = name, price = %candidate.price, "skipping candidate with invalid price");
                    continue;
                };
                if items.contains_key(name) {
                    continue;
                }
                items.insert(name.to_string(), Value::from(price * offer.quantity()));
                alternatives[product].insert(name.to_string());
            }
        }
        if items.is_empty() {
            debug!(store = address, "skipping store without relevant items");
            continue;
        }

        let key = unique_key(&request.stores, address);
        request.stores.insert(
            key,
            StoreInput {
                lat: store.lat.clone(),
                lng: store.lng.clone(),
                address: Some(address.to_string()),
                items,
            },
        );
    }

    if request.stores.is_empty() {
        return Err(PlanError::missing("stores"));
    }

    for (index, (product, names)) in products.iter().zip(alternatives).enumerate() {
        if names.is_empty() {
            return Err(PlanError::InfeasibleGroup {
                index,
                label: product.to_string(),
            });
        }
        request.groups.push(RequiredGroup::new(names));
    }

    Ok(request)
}

fn unique_key(stores: &BTreeMap<String, StoreInput>, address: &str) -> String {
    if !stores.contains_key(address) {
        return address.to_string();
    }
    (2..)
        .map(|n| format!("{address} #{n}"))
        .find(|key| !stores.contains_key(key))
        .unwrap_or_else(|| address.to_string())
}

//! Ho Chi Minh City store locations for realistic test fixtures.
//!
//! Coordinates are approximate street positions in Districts 1 and 3.

use shopping_planner::models::{Location, PlanRequest, StoreInput};

/// A named store with coordinates.
#[derive(Debug, Clone)]
pub struct Store {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Store {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn location(&self) -> Location {
        Location::new(self.lat, self.lng)
    }

    pub fn input(&self) -> StoreInput {
        StoreInput::at(self.lat, self.lng).with_address(self.name)
    }
}

pub const BEN_THANH: Location = Location {
    lat: 10.7725,
    lng: 106.6980,
};

pub const STORES: &[Store] = &[
    Store::new("Co.opmart Cong Quynh", 10.7649, 106.6893),
    Store::new("Bach Hoa Xanh Nguyen Trai", 10.7668, 106.6875),
    Store::new("WinMart Le Thanh Ton", 10.7797, 106.7017),
    Store::new("Circle K Ly Tu Trong", 10.7768, 106.6989),
    Store::new("Annam Gourmet Hai Ba Trung", 10.7808, 106.7046),
    Store::new("FamilyMart Pasteur", 10.7762, 106.6995),
    Store::new("Big C Ly Thuong Kiet", 10.7620, 106.6570),
    Store::new("Lotte Mart District 7", 10.7410, 106.7010),
];

/// Two-store request around `(10.0, 106.0)`: milk is cheaper at StoreB,
/// bread only sells at StoreA.
pub fn two_store_request() -> PlanRequest {
    PlanRequest::new(Location::new(10.0, 106.0))
        .with_store(
            "StoreA",
            StoreInput::at(10.01, 106.01)
                .with_item("milk_a", 20000.0)
                .with_item("bread_a", 15000.0),
        )
        .with_store("StoreB", StoreInput::at(10.02, 106.0).with_item("milk_b", 18000.0))
        .with_group(["milk_a", "milk_b"])
        .with_group(["bread_a"])
}

/// Every store stocks some of five product groups, with prices varying by
/// store index so no single store is cheapest for everything.
pub fn district_one_request() -> PlanRequest {
    let products = ["rice", "eggs", "milk", "coffee", "noodles"];
    let mut request = PlanRequest::new(BEN_THANH);

    for (index, store) in STORES.iter().enumerate() {
        let mut input = store.input();
        for (product_index, product) in products.iter().enumerate() {
            if (index + product_index) % 3 == 0 {
                continue;
            }
            let price = 10000.0 + ((index * 7 + product_index * 3) % 10) as f64 * 1000.0;
            input = input.with_item(format!("{product}_{index}"), price);
        }
        request = request.with_store(store.name, input);
    }

    for product in products {
        let alternatives: Vec<String> = (0..STORES.len())
            .map(|index| format!("{product}_{index}"))
            .collect();
        request = request.with_group(alternatives);
    }
    request
}

//! Test fixtures for shopping-planner.
//!
//! Provides realistic test data including:
//! - Ho Chi Minh City store locations around District 1
//! - Request builders for the small two-store scenario

pub mod hcmc_stores;

pub use hcmc_stores::*;

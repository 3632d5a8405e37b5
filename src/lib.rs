//! Loadmatch
//!
//! Load matching and consolidation planning for road freight: compatibility
//! filtering, LTL pairing, FTL backhaul and forward-haul suggestions, and
//! the assignment operation that commits a match to the entity store.

pub mod advisory;
pub mod api;
pub mod audit;
pub mod config;
pub mod constraints;
pub mod db;
pub mod error;
pub mod evaluator;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod operations;
pub mod planner;

//! Stockpile Strategy - fleet snapshots and the caching strategy engine
//!
//! A strategy is a pure function from one coherent (inventory, catalog)
//! snapshot pair to the list of cache/eject directives that would move the
//! fleet toward its configured shape. Strategies never talk to hardware;
//! the director owns dispatch.

pub mod catalog;
pub mod fleet;
pub mod proportional;
pub mod strategy;

pub use catalog::{CatalogSnapshot, Image};
pub use fleet::{InventorySnapshot, Node};
pub use proportional::SimpleProportionalStrategy;
pub use strategy::{Evaluation, Strategy, build_strategy};

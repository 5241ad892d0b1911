//! Client presence tracking
//!
//! Keeps the set of devices associated with the access point and resolves
//! their names against the DHCP lease registry.

pub mod lease;
pub mod tracker;

pub use lease::LeaseRegistry;
pub use tracker::{ClientPresenceTracker, NameResolution};

//! HTTP API handlers for parts-id

pub mod flags;
pub mod health;
pub mod identify;

pub use flags::flag_routes;
pub use health::health_routes;
pub use identify::identify_routes;

//! HTTP API handlers for morg-ai

pub mod health;
pub mod manage;
pub mod records;
pub mod settings;
pub mod upload;

pub use health::health_routes;
pub use records::record_routes;
pub use settings::settings_routes;
pub use upload::upload_routes;

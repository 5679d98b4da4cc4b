pub mod analyzer;
pub mod charts;
pub mod dashboard;
pub mod error;
pub mod geo;
pub mod loader;
pub mod logging;
pub mod models;
pub mod render;
pub mod request;
pub mod selection;
pub mod server;
pub mod wheel;

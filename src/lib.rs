pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod logging;
pub mod packer;
pub mod presets;
pub mod providers;
pub mod quantity;
pub mod render;
pub mod solver;
pub mod stock;
pub mod types;

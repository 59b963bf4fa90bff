mod capabilities;
mod config;
mod data;
mod settings;
mod validation;

pub mod expiry;
pub mod listing;

pub use capabilities::*;
pub use config::*;
pub use data::*;
pub use settings::*;
pub use validation::*;

pub mod app_config;
pub mod database;
pub mod logging;
pub mod runners;

pub use app_config::*;
pub use database::*;
pub use logging::*;
pub use runners::*;

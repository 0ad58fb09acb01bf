pub mod catalog;
pub mod command;
pub mod config;

pub use catalog::{CatalogError, CommandCatalog};
pub use command::Command;
pub use config::RunConfig;

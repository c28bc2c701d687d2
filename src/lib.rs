pub mod cache;
pub mod cli;
pub mod compendium;
pub mod config;
pub mod generator;
pub mod i18n;
pub mod llm;
pub mod utils;

// Re-export commonly used types
pub use compendium::{Address, Compendium, Domain, Topic};
pub use config::Config;
pub use generator::workflow::{Job, launch};

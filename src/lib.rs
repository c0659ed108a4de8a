pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, CliConfig, TomlConfig};
pub use core::{engine::BatchEngine, pipeline::DamPipeline};
pub use utils::error::{DamError, Result};

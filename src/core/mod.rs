pub mod area;
pub mod clip;
pub mod engine;
pub mod pipeline;
pub mod section;

pub use crate::domain::model::{BatchResult, DamInput};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Storage};
pub use crate::utils::error::Result;

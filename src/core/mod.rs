//! Core types shared across Safety Copilot.
//!
//! Configuration, the inspection steps the workflow is made of, and the
//! locking used for data files shared between processes.

mod config;
mod step;
pub mod storage;

pub use config::{
    Config, DefaultsConfig, GatewayConfig, StorageConfig, DATA_DIR_ENV, LOCAL_CONFIG_FILE,
};
pub use step::Step;

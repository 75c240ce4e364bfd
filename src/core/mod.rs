pub mod config;
pub mod error;
pub mod resources;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use resources::Resources;

// Shared utilities module
pub mod errors;
pub mod logging;
pub mod cache;
pub mod source_maps;
pub mod config_loader;

pub use errors::*;
pub use logging::*;
pub use cache::*;
pub use source_maps::*;
pub use config_loader::*;

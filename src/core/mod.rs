// Core domain layer
pub mod models;
pub mod interfaces;
pub mod queue;
pub mod dependencies;
pub mod services;

pub use models::*;
pub use interfaces::*;
pub use queue::*;
pub use dependencies::*;
pub use services::*;

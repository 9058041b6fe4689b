// Infrastructure layer
pub mod file_system;
pub mod processors;
pub mod syntax;

pub use file_system::*;
pub use processors::*;
pub use syntax::*;

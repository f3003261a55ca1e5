pub mod types;
pub mod loader;
pub mod validator;
pub mod pattern;

pub use types::*;
pub use loader::*;
pub use validator::*;
pub use pattern::*;

//! Route matching: typed path templates and per-method tables.

pub mod path;
pub mod table;
pub use path::{ParamType, PathTemplate, RouteError, Segment};
pub use table::{Route, Router};

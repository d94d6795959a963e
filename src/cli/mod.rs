//! CLI command handling

pub mod check;
pub mod notify;
pub mod run;

pub use check::*;
pub use notify::*;
pub use run::*;

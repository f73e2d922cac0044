//! Free-text parsers for package descriptions and SIGs.

mod package;
mod sig;

pub use package::*;
pub use sig::*;

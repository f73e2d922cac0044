//! Domain models for the NDC calculator.

mod instruction;
mod package;
mod product;
mod result;
mod unit;

pub use instruction::*;
pub use package::*;
pub use product::*;
pub use result::*;
pub use unit::*;

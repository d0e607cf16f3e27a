//! Configuration module.

mod env;
mod product;
mod resolver;
mod settings;

pub use env::*;
pub use product::*;
pub use resolver::*;
pub use settings::*;

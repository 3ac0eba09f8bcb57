pub mod chain;
pub mod dispatch;
pub mod document;
pub mod error;
pub mod source;
pub mod traverse;

#[cfg(test)]
mod mocks;

pub use chain::*;
pub use dispatch::*;
pub use document::*;
pub use error::*;
pub use source::*;
pub use traverse::*;

pub mod backend;
pub mod save;

pub use backend::*;
pub use save::*;

pub mod catalog;
pub mod memory;
pub mod traits;

pub use catalog::*;
pub use memory::*;
pub use traits::*;

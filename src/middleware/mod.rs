pub mod admission;
pub mod logging;

pub use admission::*;
pub use logging::*;

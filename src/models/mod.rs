pub mod ai;
pub mod artifact;
pub mod extraction;
pub mod request;
pub mod response;

pub use ai::*;
pub use artifact::*;
pub use extraction::*;
pub use request::*;
pub use response::*;

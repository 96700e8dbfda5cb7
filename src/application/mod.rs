pub mod coordinator;
pub mod error;

pub use coordinator::*;
pub use error::*;

pub mod error;
pub mod principal;
pub mod task;
pub mod view;

pub use error::*;
pub use principal::*;
pub use task::*;
pub use view::*;

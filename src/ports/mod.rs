pub mod auth;
pub mod config_store;
pub mod task_store;

pub use auth::*;
pub use config_store::*;
pub use task_store::*;

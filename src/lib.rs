pub mod config;
pub mod models;
pub mod source;
pub mod storage;
pub mod sync;

// Convenient re-exports for tests and external callers
pub use config::*;
pub use models::*;
pub use source::*;
pub use storage::*;
pub use sync::*;

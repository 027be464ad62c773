//! Storage for watcher state.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── config.toml           # Watcher configuration
//! └── seen.json             # Links already delivered
//! ```

pub mod seen;

// Re-export for convenience
pub use seen::{SeenFile, SeenStore};

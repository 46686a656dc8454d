pub mod config;
pub mod macros;
pub mod util;

pub use tracing;

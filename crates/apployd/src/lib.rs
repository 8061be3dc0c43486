//! Public surface of the Apployd assistant.
//!
//! Re-exports the building blocks used by the `apployd` binary and provides
//! the terminal helpers it shares with tests.

/// Re-export for convenience.
pub use apployd_config as config;
pub use apployd_core as core;
/// Re-export for convenience.
pub use apployd_memory as memory;
/// Re-export for convenience.
pub use apployd_protocol as protocol;

pub mod render;
pub mod slash;

/// Initialize `env_logger` with millisecond timestamps and `RUST_LOG` parsing.
///
/// Repeated calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}

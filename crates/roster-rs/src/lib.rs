//! Roster: conversational queries over employee records.
//!
//! Applications depend on this crate alone and reach the pipeline pieces
//! through the module aliases below.

pub use roster_rs_config as config;
pub use roster_rs_core as core;
pub use roster_rs_protocol as protocol;
pub use roster_rs_server as server;
pub use roster_rs_store as store;

/// Route `log` output through env_logger (`RUST_LOG` filters) when the
/// `logging` feature is on. Calling it twice is harmless.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let _ = env_logger::builder()
            .format_timestamp_millis()
            .parse_default_env()
            .try_init();
    }
}

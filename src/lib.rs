pub mod config;
pub mod error;
pub mod transfer;

pub use config::{AppConfig, GhostRetryConfig, GroupConfig};
pub use error::{AppError, Result};
pub use transfer::{TransferOutcome, TransferRequest, TransferService};

/// Install the global log subscriber: `RUST_LOG` when set, else `info`.
///
/// SDK `log` records are forwarded through the subscriber's log bridge.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

//! Logging and tracing configuration
//!
//! Structured logging via the `tracing` crate. Initialize once at startup:
//!
//! ```rust,ignore
//! logging::init(cli.verbose, cli.quiet);
//! ```
//!
//! `RUST_LOG` overrides the defaults at runtime:
//! ```bash
//! RUST_LOG=debug cartage ...            # All debug logs
//! RUST_LOG=cartage=trace cartage ...    # Trace for this crate only
//! ```
//!
//! Everything goes to stderr so `--json` output on stdout stays parseable.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging/tracing system.
///
/// `verbose` lifts the default level to debug; `quiet` drops it to error.
/// An explicit `RUST_LOG` wins over both.
pub fn init(verbose: bool, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("cartage=error")
        } else if verbose {
            EnvFilter::new("cartage=debug")
        } else {
            EnvFilter::new("cartage=info")
        }
    });

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_writer(std::io::stderr)
            .compact(),
    );

    // Ignore error if already set (tests may init repeatedly)
    let _ = tracing::subscriber::set_global_default(subscriber);
}

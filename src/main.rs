//! Binary entry point for the UserOperation analytics exporter.
//!
//! ```text
//! main.rs (runtime)
//!     ↓
//! cli::run
//!     1. .env + flags           (config)
//!     2. tracing                (observability)
//!     3. bundler set, tables    (bundlers, aggregator)
//!     4. recorder + listener    (exporter, api)
//!     5. node connection        (rpc)
//!     6. subscription loop      (subscriber)
//! ```

use erc4337_analytics::cli;
use tracing::error;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        return Err(eyre::Report::new(e));
    }
    Ok(())
}

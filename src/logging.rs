use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Warnings (disabled tiers, failed lookups, fallbacks) always reach stderr;
/// `--verbose` adds tier decisions and store writes.
pub fn init(verbose: bool) -> Result<()> {
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(max_level(verbose))
        .with_target(verbose)
        .without_time()
        .compact()
        .try_init();
    Ok(())
}

fn max_level(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::WARN }
}

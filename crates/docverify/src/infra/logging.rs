//! Tracing subscriber setup.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_tree::HierarchicalLayer;

/// Install the global subscriber. Logs go to stderr so the report on stdout stays clean.
///
/// Verbose runs get a span tree, which makes per-session compile timing easy to follow.
pub fn init(verbose: bool) {
    let result = if verbose {
        tracing_subscriber::registry()
            .with(LevelFilter::DEBUG)
            .with(
                HierarchicalLayer::new(2)
                    .with_writer(std::io::stderr)
                    .with_targets(true),
            )
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_max_level(LevelFilter::WARN)
            .with_writer(std::io::stderr)
            .with_target(false)
            .finish()
            .try_init()
    };

    if let Err(err) = result {
        eprintln!("tracing already initialised: {err}");
    }
}

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, fmt};

const DEFAULT_DIRECTIVES: &str = "folio=info,folio_docs=info,folio_core=info";

/// Installs the global subscriber. `RUST_LOG` overrides the default
/// directives. Only the binary calls this.
pub fn init() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let subscriber = tracing_subscriber::Registry::default().with(
        fmt::Layer::new()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter),
    );

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

// civic_zone_rust\src\trace.rs
use once_cell::sync::OnceCell;
use thiserror::Error;

static SUB_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("tracing init error: {0}")]
    Init(String),
}

/// Install the global subscriber once. Later calls are no-ops, so tests
/// and the binary can both call it freely.
pub fn init_tracing(filter: &str, json: bool) -> Result<(), TraceError> {
    SUB_INIT.get_or_try_init(|| setup_subscriber(filter, json))?;
    Ok(())
}

fn setup_subscriber(filter: &str, json: bool) -> Result<(), TraceError> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

    // RUST_LOG が設定されていればそちらを優先
    let env = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| TraceError::Init(format!("bad filter `{filter}`: {e}")))?;

    let registry = Registry::default().with(env);
    let res = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_level(true).with_writer(std::io::stderr))
            .try_init()
    };
    res.map_err(|e| TraceError::Init(e.to_string()))
}

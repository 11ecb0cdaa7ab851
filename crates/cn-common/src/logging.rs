//! Logging bootstrap shared by all binaries

use tracing_subscriber::EnvFilter;

use crate::{CommonError, Result};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level` when set. `json` switches the
/// formatter to one JSON object per line for log shipping.
pub fn init(default_level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| CommonError::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| CommonError::Logging(e.to_string()))
}

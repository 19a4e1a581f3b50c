//! Small helpers shared by the taxvote binaries.

use chrono::Local;
use env_logger::LogBuilder;
use log::{LogLevelFilter, LogRecord};
use std::env;

/// Initialize global logging at the requested level.
///
/// Honors `RUST_LOG` on top of the level picked by the caller, so `-v` and
/// environment filtering compose.
pub fn init_logging(level: LogLevelFilter) {
    let mut builder = LogBuilder::new();

    builder
        .format(|record: &LogRecord| {
            format!("{} [{}] {}",
                    Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.args())
        })
        .filter(None, level);

    if let Ok(spec) = env::var("RUST_LOG") {
        builder.parse(&spec);
    }

    let _ = builder.init();
}

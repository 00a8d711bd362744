//! Console logging setup.

use std::io::Write;

use env_logger::Builder;
use log::{Level, LevelFilter};

/// Initialize `env_logger`: dependencies at `warn`, this crate at `info`
/// (`debug` when verbose). `RUST_LOG` is still honored for other targets.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_CRATE_NAME"), level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            match record.level() {
                Level::Error | Level::Warn => writeln!(
                    buf,
                    "[{} {} {}] {}",
                    name,
                    record.level(),
                    record.target(),
                    record.args()
                ),
                _ => writeln!(buf, "[{}] {}", name, record.args()),
            }
        })
        .init();
}

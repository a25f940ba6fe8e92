use env_logger::Env;
use log::LevelFilter;
use std::sync::Once;

static ONCE_INIT: Once = Once::new();

/// Installs the logger at `info`, unless `RUST_LOG` says otherwise.
pub fn init() {
    init_with_level(LevelFilter::Info);
}

/// Installs the logger with `level` as the default filter. Only the first call
/// in a process has any effect.
pub fn init_with_level(level: LevelFilter) {
    ONCE_INIT.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or(level.as_str()))
            .format_timestamp(None)
            .format_target(false)
            .init();
    });
}

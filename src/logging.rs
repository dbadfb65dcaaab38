//! Logging setup: `log`/`env_logger`, gated by `--debug` or the `PATCHELF_DEBUG`
//! environment variable. Layout decisions (which growth strategy was chosen, where
//! sections landed) log at `debug!`; per-file operation summaries log at `info!`;
//! the two recoverable-warning cases (a `DT_RELA` tag with no matching `.rela.dyn`
//! section, a `--shrink-rpath` prefix filter that dropped every directory) log at
//! `warn!`.

use env_logger::Builder;
use log::LevelFilter;

/// Initialize the global logger. `debug_flag` is `--debug`; the env var is checked
/// regardless so `PATCHELF_DEBUG=1` works without the flag.
pub fn init(debug_flag: bool) {
    let debug = debug_flag || std::env::var_os("PATCHELF_DEBUG").is_some();
    let default_level = if debug { LevelFilter::Debug } else { LevelFilter::Warn };

    let mut builder = Builder::new();
    builder.filter_level(default_level);
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }
    let _ = builder.try_init();
}

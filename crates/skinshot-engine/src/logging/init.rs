use std::io::Write;
use std::sync::Once;

use log::LevelFilter;

/// Crates that are chatty at info. They stay at warn unless a filter names them.
const NOISY_CRATES: [&str; 3] = ["wgpu_core", "wgpu_hal", "naga"];

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` filter, e.g. "skinshot_worker=debug,wgpu_core=warn".
    /// `RUST_LOG` is used when this is `None`.
    pub filter: Option<String>,

    /// Level applied when neither a filter nor `RUST_LOG` is given.
    pub default_level: LevelFilter,

    /// Prefix each line with the logging thread's name.
    ///
    /// Worker threads are named `skinshot-worker-{id}`, which is the only place
    /// the id of the worker handling a job shows up.
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            default_level: LevelFilter::Info,
            thread_names: true,
        }
    }
}

impl LoggingConfig {
    /// Resolves the filter directives: the explicit filter, else `env`, else
    /// the default level with the noisy crates capped at warn.
    pub fn directives(&self, env: Option<String>) -> String {
        if let Some(filter) = self.filter.clone().or(env).filter(|f| !f.trim().is_empty()) {
            return filter;
        }

        let mut directives = self.default_level.to_string().to_lowercase();
        let cap = LevelFilter::Warn.min(self.default_level).to_string().to_lowercase();
        for krate in NOISY_CRATES {
            directives.push_str(&format!(",{krate}={cap}"));
        }
        directives
    }
}

static INIT: Once = Once::new();

/// Installs the global logger. Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let directives = config.directives(std::env::var("RUST_LOG").ok());
        let mut builder = env_logger::Builder::new();
        builder.parse_filters(&directives);

        if config.thread_names {
            builder.format(|buf, record| {
                let thread = std::thread::current();
                writeln!(
                    buf,
                    "[{} {:<5} {} {}] {}",
                    buf.timestamp(),
                    record.level(),
                    thread.name().unwrap_or("unnamed"),
                    record.target(),
                    record.args()
                )
            });
        }

        // try_init: test binaries may race to install a logger.
        if builder.try_init().is_ok() {
            log::debug!("logging initialized with {directives:?}");
        }
    });
}

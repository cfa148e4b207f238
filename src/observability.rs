//! Logging setup and diagnostic macros.
//!
//! The library only emits through the `log` facade. Hosts that want output
//! call [`enable_verbose_logging`] once; later calls are no-ops.

use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};
use std::str::FromStr;
use std::sync::Once;

use colored::*;
use log::{Level, LevelFilter};

use crate::config::LoggingConfig;
use crate::error::NmrProcError;

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend printing `[LEVEL] message` lines.
///
/// Output goes to `config.file` in append mode when set, otherwise to stderr,
/// colored when stderr is a terminal.
pub fn enable_verbose_logging(config: &LoggingConfig) -> Result<(), NmrProcError> {
    let level = LevelFilter::from_str(&config.level).map_err(|_| {
        NmrProcError::Configuration(format!("unknown log level '{}'", config.level))
    })?;
    let file = match &config.file {
        Some(path) => Some(OpenOptions::new().append(true).create(true).open(path)?),
        None => None,
    };
    let colorize = file.is_none() && std::io::stderr().is_terminal();

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(level);

        builder.format(move |buf, record| {
            let tag = format!("[{}]", record.level());
            let tag = if colorize {
                match record.level() {
                    Level::Error => tag.red().bold(),
                    Level::Warn => tag.yellow(),
                    Level::Info => tag.green(),
                    Level::Debug | Level::Trace => tag.dimmed(),
                }
                .to_string()
            } else {
                tag
            };
            writeln!(buf, "{} {}", tag, record.args())?;
            buf.flush()?;
            Ok(())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        let _ = builder.try_init();
    });
    Ok(())
}

/// Evaluates an expression and logs its wall time at debug level.
///
/// ```ignore
/// let result = timed!("engine execution", engine.execute(request));
/// ```
#[macro_export]
macro_rules! timed {
    ($label:expr, $body:expr) => {{
        let __start = ::std::time::Instant::now();
        let __result = $body;
        ::log::debug!("{} took {:?}", $label, __start.elapsed());
        __result
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_level() {
        let config = LoggingConfig {
            level: "chatty".to_string(),
            file: None,
        };
        assert!(matches!(
            enable_verbose_logging(&config),
            Err(NmrProcError::Configuration(_))
        ));
    }

    #[test]
    fn test_timed_returns_the_value() {
        let value = timed!("sum", (1..=4).sum::<i32>());
        assert_eq!(value, 10);
    }
}

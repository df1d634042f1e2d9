//! Program logging, built on `fern`.
//!
//! Messages are split in two streams. Warnings and errors go to stderr and the error log file,
//! while everything else goes to stdout and the info log file. Log files are only written when a
//! match is played, in which case they are placed alongside the other output files.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Metadata, Record};
use std::env;
use std::fmt::Arguments;
use std::fs::File;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// A flag indicating whether the logger has been initialised
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// The default log level for the program.
///
/// Used as a fallback if the user hasn't specified something else with the
/// `HYDRO_TRADER_LOG_LEVEL` environment variable or the settings.toml file.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The name of the environment variable which overrides the log level
const LOG_LEVEL_ENV_VAR: &str = "HYDRO_TRADER_LOG_LEVEL";

/// The file name for the log file containing messages about the ordinary running of a match
const LOG_INFO_FILE_NAME: &str = "hydro_trader_info.log";

/// The file name for the log file containing warnings and error messages
const LOG_ERROR_FILE_NAME: &str = "hydro_trader_error.log";

/// One of the two streams log messages are split into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    /// Info, debug and trace messages
    Info,
    /// Warnings and errors
    Error,
}

impl Stream {
    /// Whether a message belongs to this stream
    fn accepts(self, metadata: &Metadata) -> bool {
        let is_warning = metadata.level() <= LevelFilter::Warn;
        match self {
            Self::Info => !is_warning,
            Self::Error => is_warning,
        }
    }

    /// The most verbose level written to the console for this stream
    fn console_level(self, log_level: LevelFilter) -> LevelFilter {
        match self {
            Self::Info => log_level,
            Self::Error => log_level.min(LevelFilter::Warn),
        }
    }

    /// The most verbose level written to the log file for this stream.
    ///
    /// Log files always record the course of the match, even if the console is quieter.
    fn file_level(self, log_level: LevelFilter) -> LevelFilter {
        match self {
            Self::Info => log_level.max(LevelFilter::Info),
            Self::Error => LevelFilter::Warn,
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Self::Info => LOG_INFO_FILE_NAME,
            Self::Error => LOG_ERROR_FILE_NAME,
        }
    }
}

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Initialise the program logger.
///
/// The log level is taken from the `HYDRO_TRADER_LOG_LEVEL` environment variable if it is set,
/// otherwise from `settings.toml`, otherwise [`DEFAULT_LOG_LEVEL`]. Valid levels are `off`,
/// `error`, `warn`, `info`, `debug` and `trace`.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level specified in `settings.toml`
/// * `log_file_path`: The directory in which to create log files, if any
pub fn init(log_level_from_settings: Option<&str>, log_file_path: Option<&Path>) -> Result<()> {
    let log_level = env::var(LOG_LEVEL_ENV_VAR).unwrap_or_else(|_| {
        log_level_from_settings
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string()
    });
    let log_level = parse_log_level(&log_level)?;

    let mut dispatch = Dispatch::new()
        .chain(console_dispatch(Stream::Info, log_level))
        .chain(console_dispatch(Stream::Error, log_level));
    if let Some(dir) = log_file_path {
        for stream in [Stream::Info, Stream::Error] {
            dispatch = dispatch.chain(file_dispatch(stream, log_level, dir)?);
        }
    }

    dispatch.apply().context("Logger already initialised")?;
    LOGGER_INIT.get_or_init(|| ());

    Ok(())
}

/// Convert a log level string to a [`LevelFilter`]
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// Write one stream to stdout or stderr, in colour if it is a terminal
fn console_dispatch(stream: Stream, log_level: LevelFilter) -> Dispatch {
    let (is_terminal, output): (bool, Box<dyn std::io::Write + Send>) = match stream {
        Stream::Info => (std::io::stdout().is_terminal(), Box::new(std::io::stdout())),
        Stream::Error => (std::io::stderr().is_terminal(), Box::new(std::io::stderr())),
    };
    let colours = is_terminal.then(|| {
        ColoredLevelConfig::new()
            .error(Color::Red)
            .warn(Color::Yellow)
            .info(Color::Green)
            .debug(Color::Blue)
            .trace(Color::Magenta)
    });

    Dispatch::new()
        .filter(move |metadata| stream.accepts(metadata))
        .format(move |out, message, record| format_record(out, message, record, colours.as_ref()))
        .level(stream.console_level(log_level))
        .chain(output)
}

/// Write one stream to a new log file in `dir`, replacing any log from an earlier run
fn file_dispatch(stream: Stream, log_level: LevelFilter, dir: &Path) -> Result<Dispatch> {
    let path = dir.join(stream.file_name());
    let file = File::create(&path)
        .with_context(|| format!("Could not create log file {}", path.display()))?;

    Ok(Dispatch::new()
        .filter(move |metadata| stream.accepts(metadata))
        .format(|out, message, record| format_record(out, message, record, None))
        .level(stream.file_level(log_level))
        .chain(file))
}

/// Format a message as `[time level target] message`
fn format_record(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    colours: Option<&ColoredLevelConfig>,
) {
    let timestamp = Local::now().format("%H:%M:%S");
    let target = record.target();
    match colours {
        Some(colours) => {
            let level = colours.color(record.level());
            out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
        }
        None => {
            let level = record.level();
            out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
        }
    }
}

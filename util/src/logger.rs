//! Logging setup for console and session log file
//!
//! Records go to two places: stdout with coloured level tags, and the
//! session's log file as plain text. Both share one line layout, with the
//! seconds since the session epoch first so that the file lines up with the
//! archived data.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info, Level};
use colored::{ColoredString, Colorize};
use std::fmt::Display;
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a base log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// `base_level` applies to every target not listed in `target_levels`. It
/// must be `INFO` or more verbose so the session header always reaches the
/// log file. Listed targets (module path prefixes such as `"ctrl_lib"`) get
/// their own level, which lets the controller trace its loops without the
/// rest of the stack doing the same.
///
/// Must only be called once per process.
pub fn logger_init(
    base_level: LevelFilter,
    target_levels: &[(&'static str, LevelFilter)],
    session: &session::Session
) -> Result<(), LoggerInitError> {

    if base_level < Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(base_level))
    }

    let console = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", format_line(
                session::get_elapsed_seconds(),
                record.level(),
                record.target(),
                message,
                true
            )))
        })
        .chain(std::io::stdout());

    let file = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("{}", format_line(
                session::get_elapsed_seconds(),
                record.level(),
                record.target(),
                message,
                false
            )))
        })
        .chain(fern::log_file(session.log_file_path.clone())
            .map_err(LoggerInitError::LogFileInitError)?);

    target_levels.iter()
        .fold(
            fern::Dispatch::new().level(base_level),
            |dispatch, &(target, level)| dispatch.level_for(target, level)
        )
        .chain(console)
        .chain(file)
        .apply()
        .map_err(LoggerInitError::FernInitError)?;

    info!("Logging initialised");
    if let Some(epoch) = session::get_epoch() {
        info!("    Session epoch: {}", epoch);
    }
    info!("    Log level: {:?}", base_level);
    for (target, level) in target_levels {
        info!("    Log level for {}: {:?}", target, level);
    }
    info!("    Log file path: {:?}", session.log_file_path);

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Lay out one log line. Debug and trace lines carry their target.
fn format_line(
    elapsed_s: f64,
    level: Level,
    target: &str,
    message: &dyn Display,
    coloured: bool
) -> String {
    let tag = if coloured {
        coloured_tag(level).to_string()
    }
    else {
        level_tag(level).to_string()
    };

    if level > Level::Info {
        format!("[{:10.6} {}] {}: {}", elapsed_s, tag, target, message)
    }
    else {
        format!("[{:10.6} {}] {}", elapsed_s, tag, message)
    }
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Trace => "TRC",
        Level::Debug => "DBG",
        Level::Info  => "INF",
        Level::Warn  => "WRN",
        Level::Error => "ERR"
    }
}

fn coloured_tag(level: Level) -> ColoredString {
    let tag = level_tag(level);
    match level {
        Level::Trace => tag.dimmed().italic(),
        Level::Debug => tag.dimmed(),
        Level::Info  => tag.normal(),
        Level::Warn  => tag.yellow(),
        Level::Error => tag.red().bold()
    }
}

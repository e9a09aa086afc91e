/*
 *  logging.rs: Logging functionality for dwipe.
 *
 *  Copyright Darik Horn <dajhorn-dban@vanadac.com>.
 *  Modifications to original dwipe Copyright Andy Beverley <andy@andybev.com>
 *
 *  This program is free software; you can redistribute it and/or modify it under
 *  the terms of the GNU General Public License as published by the Free Software
 *  Foundation, version 2.
 */

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::context::WipeContext;

// Global log storage
lazy_static::lazy_static! {
    static ref LOG_LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());
    static ref LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);
}

/// Log levels for dwipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Fatal error messages.
    Fatal,
    /// Error messages.
    Error,
    /// Warning messages.
    Warning,
    /// Notice messages.
    Notice,
    /// Informational messages.
    Info,
    /// Debug messages.
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Fatal => write!(f, "FATAL"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Notice => write!(f, "NOTICE"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Debug => write!(f, "DEBUG"),
        }
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Fatal | LogLevel::Error => log::Level::Error,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Notice | LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

/// Initialize the logging system.
///
/// The console sink is only installed when the terminal is not owned by the
/// status screen; the log file receives everything either way.
pub fn init_logging(logfile: Option<&Path>, console: bool) {
    if let Some(path) = logfile {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                *LOG_FILE.lock().unwrap() = Some(file);
            }
            Err(e) => {
                eprintln!("Warning: unable to open log file '{}': {}", path.display(), e);
            }
        }
    }

    if console {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .try_init();
    }

    LOG_LINES.lock().unwrap().clear();
    wipe_log(LogLevel::Notice, "Program loaded.");
}

/// Log a message with a timestamp and severity.
pub fn wipe_log(level: LogLevel, message: &str) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let line = format!("{} {} {}", now, level, message);

    LOG_LINES.lock().unwrap().push(line.clone());

    if let Ok(log_file) = LOG_FILE.lock() {
        if let Some(mut file) = log_file.as_ref() {
            let _ = writeln!(file, "{}", line);
            let _ = file.flush();
        }
    }

    log::log!(log::Level::from(level), "{}", message);
}

/// Log an I/O error in the classic perror style.
pub fn wipe_perror(err: &std::io::Error, function: &str, message: &str) {
    wipe_log(
        LogLevel::Error,
        &format!("{}(): {}: {}", function, message, err),
    );
}

/// The most recent log lines, newest last.
pub fn recent_lines(count: usize) -> Vec<String> {
    let lines = LOG_LINES.lock().unwrap();
    let start = lines.len().saturating_sub(count);
    lines[start..].to_vec()
}

/// Log system information.
pub fn log_sysinfo() {
    let os_info = os_info::get();
    wipe_log(
        LogLevel::Info,
        &format!("Operating System: {} {}", os_info.os_type(), os_info.version()),
    );

    if let Ok(cpus) = sys_info::cpu_num() {
        wipe_log(LogLevel::Info, &format!("CPU Count: {}", cpus));
    }

    if let Ok(mem) = sys_info::mem_info() {
        wipe_log(LogLevel::Info, &format!("Memory: {} MB", mem.total / 1024));
    }

    if let Ok(kernel) = sys_info::os_release() {
        wipe_log(LogLevel::Info, &format!("Kernel: {}", kernel));
    }
}

/// Log a summary of the wipe results.
pub fn log_summary(contexts: &[std::sync::Arc<WipeContext>]) {
    wipe_log(LogLevel::Info, "*********************************************");
    wipe_log(LogLevel::Info, "                Wipe Summary                 ");
    wipe_log(LogLevel::Info, "*********************************************");

    for context in contexts {
        let result = context.result.load(Ordering::Relaxed);
        let signal = context.signal.load(Ordering::Relaxed);

        let outcome = if signal > 0 {
            format!("interrupted by signal {}", signal)
        } else if result == 0 {
            "completed successfully".to_string()
        } else {
            format!("failed with error code {}", result)
        };

        wipe_log(
            LogLevel::Info,
            &format!("Device: {} - wipe {}", context.device_name, outcome),
        );

        if !context.identity.serial_no.is_empty() {
            wipe_log(
                LogLevel::Info,
                &format!("  Serial Number: {}", context.identity.serial_no),
            );
        }

        let io_errors = context.round_errors.load(Ordering::Relaxed);
        let verify_errors = context.verify_errors.load(Ordering::Relaxed);
        if io_errors > 0 || verify_errors > 0 {
            wipe_log(
                LogLevel::Info,
                &format!(
                    "  I/O errors: {}, verification errors: {}",
                    io_errors, verify_errors
                ),
            );
        }
    }

    wipe_log(LogLevel::Info, "*********************************************");
}

/// Convert seconds to hours, minutes, and seconds.
pub fn hours_minutes_seconds(seconds: u64) -> (u64, u64, u64) {
    (seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

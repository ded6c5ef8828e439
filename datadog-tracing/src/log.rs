// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicUsize, Ordering},
};

static MAX_LOG_LEVEL: AtomicUsize = AtomicUsize::new(LogLevel::Error as usize);

/// The level at which the library will log. `Off` disables all output;
/// message levels are ordered `Error < Warn < Info < Debug`.
#[repr(usize)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum LogLevel {
    Off,
    #[default]
    Error,
    Warn,
    Info,
    Debug,
}

pub fn set_max_level(level: LogLevel) {
    MAX_LOG_LEVEL.store(level as usize, Ordering::Relaxed);
}

pub fn max_level() -> LogLevel {
    match MAX_LOG_LEVEL.load(Ordering::Relaxed) {
        0 => LogLevel::Off,
        1 => LogLevel::Error,
        2 => LogLevel::Warn,
        3 => LogLevel::Info,
        _ => LogLevel::Debug,
    }
}

impl FromStr for LogLevel {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("debug") {
            Ok(LogLevel::Debug)
        } else if s.eq_ignore_ascii_case("info") {
            Ok(LogLevel::Info)
        } else if s.eq_ignore_ascii_case("warn") {
            Ok(LogLevel::Warn)
        } else if s.eq_ignore_ascii_case("error") {
            Ok(LogLevel::Error)
        } else if s.eq_ignore_ascii_case("off") {
            Ok(LogLevel::Off)
        } else {
            Err("log level should be one of DEBUG, INFO, WARN, ERROR, OFF")
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            LogLevel::Off => "OFF",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        };
        write!(f, "{level}")
    }
}

#[macro_export]
macro_rules! dd_debug {
    ($($arg:tt)+) => {
        $crate::dd_log!($crate::log::LogLevel::Debug, $($arg)*)
    };
}

#[macro_export]
macro_rules! dd_info {
    ($($arg:tt)+) => {
        $crate::dd_log!($crate::log::LogLevel::Info, $($arg)*)
    };
}

#[macro_export]
macro_rules! dd_warn {
    ($($arg:tt)+) => {
        $crate::dd_log!($crate::log::LogLevel::Warn, $($arg)*)
    };
}

#[macro_export]
macro_rules! dd_error {
    ($($arg:tt)+) => {
        $crate::dd_log!($crate::log::LogLevel::Error, $($arg)*)
    };
}

#[macro_export]
macro_rules! dd_log {
    ($lvl:expr, $($arg:tt)+) => {
        let lvl = $lvl;
        if lvl != $crate::log::LogLevel::Off && lvl <= $crate::log::max_level() {
            if lvl == $crate::log::LogLevel::Error {
                eprintln!("\x1b[91mERROR\x1b[0m {}:{} - {}", file!(), line!(), format!($($arg)*));
            } else {
                println!("\x1b[93m{}\x1b[0m {}:{} - {}", lvl, file!(), line!(), format!($($arg)*));
            }
        }
    };
}

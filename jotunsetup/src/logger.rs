// SPDX-License-Identifier: JOSSL-1.0
// Copyright (C) 2025 The Jotunheim Project
//! `log` backend writing single lines to a diagnostic sink (the serial port).

use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Once;

/// Byte sink for log lines. Must not call back into the logger.
pub trait LogSink: Sync {
    fn write_str(&self, s: &str);
}

struct SinkWriter<'a>(&'a dyn LogSink);

impl fmt::Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

pub struct BootLogger {
    sink: Once<&'static dyn LogSink>,
}

impl BootLogger {
    pub const fn new() -> Self {
        Self { sink: Once::new() }
    }
}

impl Default for BootLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for BootLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = self.sink.get() {
            emit(*sink, record);
        }
    }

    fn flush(&self) {}
}

/// `[LEVEL] target: message` followed by CR LF.
pub fn emit(sink: &dyn LogSink, record: &Record<'_>) {
    let _ = write!(
        SinkWriter(sink),
        "[{}] {}: {}\r\n",
        record.level(),
        record.target(),
        record.args()
    );
}

static LOGGER: BootLogger = BootLogger::new();

pub fn level_for(quiet: bool) -> LevelFilter {
    if quiet { LevelFilter::Warn } else { LevelFilter::Debug }
}

/// Install the logger. Only the first sink registered is ever used.
pub fn init(sink: &'static dyn LogSink) -> Result<(), SetLoggerError> {
    LOGGER.sink.call_once(|| sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level_for(false));
    Ok(())
}

/// Apply the `quiet` option once the command line has been read.
pub fn set_quiet(quiet: bool) {
    log::set_max_level(level_for(quiet));
}

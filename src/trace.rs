use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{LevelFilter, Log, Metadata, Record};

/// `log` sink that echoes every line to stdout and appends it to a trace
/// file. Nothing is flushed per line; the buffer is flushed on `flush()`.
pub struct TraceLogger {
    level: LevelFilter,
    file: Mutex<Option<BufWriter<File>>>,
    failed: AtomicBool,
}

impl TraceLogger {
    pub fn new(path: Option<&str>, level: LevelFilter) -> Result<Self, String> {
        let file = match path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| format!("Failed to open {}: {}", path, e))?;
                Some(BufWriter::new(file))
            }
            None => None,
        };
        Ok(Self {
            level,
            file: Mutex::new(file),
            failed: AtomicBool::new(false),
        })
    }

    /// True once a write to the trace file has failed.
    pub fn write_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }

    // Reported on stderr once; later failures are counted as the same one
    fn report(&self, e: std::io::Error) {
        if !self.failed.swap(true, Ordering::Relaxed) {
            eprintln!("Trace file write failed: {}", e);
        }
    }
}

impl Log for TraceLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("{}", record.args());
        println!("{}", line);
        if let Ok(mut guard) = self.file.lock() {
            if let Some(writer) = guard.as_mut() {
                if let Err(e) = writeln!(writer, "{}", line) {
                    self.report(e);
                }
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(writer) = guard.as_mut() {
                if let Err(e) = writer.flush() {
                    self.report(e);
                }
            }
        }
    }
}

/// Installs a [`TraceLogger`] as the global logger. Fails if a logger is
/// already set or the trace file cannot be created.
pub fn init(path: Option<&str>, level: LevelFilter) -> Result<(), String> {
    let logger = TraceLogger::new(path, level)?;
    log::set_boxed_logger(Box::new(logger)).map_err(|e| e.to_string())?;
    log::set_max_level(level);
    Ok(())
}

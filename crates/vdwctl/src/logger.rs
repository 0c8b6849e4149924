//! Defines the logger that writes driver and tool messages to stderr.

use std::io::Write;

use log::LevelFilter;
use spin::{Mutex, Once};

pub struct Logger {
    level: LevelFilter,
    output: Mutex<std::io::Stderr>,
}

static DEFAULT: Once<Logger> = Once::new();

impl Logger {
    /// Installs the logger, with more detail for each `-v`.
    ///
    /// Only the first call has any effect.
    pub fn init(verbosity: u8) -> &'static Self {
        let logger = DEFAULT.call_once(|| Logger {
            level: level_for(verbosity),
            output: Mutex::new(std::io::stderr()),
        });
        logger.install();
        logger
    }

    fn install(&'static self) {
        if log::set_logger(self).is_ok() {
            log::set_max_level(self.level);
        }
    }
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // Nowhere left to report a failed write to stderr.
        let _ = write_log_entry_to(&mut *self.output.lock(), record);
    }

    fn flush(&self) {
        let _ = self.output.lock().flush();
    }
}

fn write_log_entry_to(writer: &mut impl Write, record: &log::Record) -> std::io::Result<()> {
    #[cfg(feature = "detailed-logging")]
    return writeln!(
        writer,
        "[{} {}:{} {}] {}",
        record.level(),
        record.file().unwrap_or("unknown"),
        record.line().unwrap_or(0),
        record.target(),
        record.args()
    );
    #[cfg(not(feature = "detailed-logging"))]
    return writeln!(writer, "[{:5}] {}", record.level(), record.args());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(3), LevelFilter::Trace);
        assert_eq!(level_for(u8::MAX), LevelFilter::Trace);
    }

    #[test]
    fn entry_format() {
        let mut out = Vec::new();
        write_log_entry_to(
            &mut out,
            &log::Record::builder()
                .level(log::Level::Info)
                .target("uio_vdw")
                .args(format_args!("hello {}", 1))
                .build(),
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("hello 1\n"));
        assert!(text.contains("INFO"));
    }
}

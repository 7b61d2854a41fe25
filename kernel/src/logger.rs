//! Console logger for the AES kernel
//!
//! Routes the `log` facade to the BIOS console before (and after) the
//! screen is in graphic mode. Formatting never allocates.

use log::{Level, LevelFilter, Metadata, Record};
use spin::Once;

/// Raw console output (BIOS `Bconout` on the target, a buffer in tests)
pub trait ConsoleSink: Sync {
    fn write_bytes(&self, bytes: &[u8]);
}

/// Logger that writes to the installed console sink
struct ConsoleLogger;

static SINK: Once<&'static dyn ConsoleSink> = Once::new();

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = SINK.get() {
            let mut buf = [0u8; 256];
            let pos = format_record(&mut buf, record.level(), record.target(), record.args());
            sink.write_bytes(&buf[..pos]);
        }
    }

    fn flush(&self) {}
}

/// Simple buffer writer for formatting without alloc
pub struct BufferWriter<'a> {
    pub buffer: &'a mut [u8],
    pub pos: usize,
}

impl<'a> core::fmt::Write for BufferWriter<'a> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let remaining = self.buffer.len() - self.pos;
        let to_write = bytes.len().min(remaining);

        if to_write > 0 {
            self.buffer[self.pos..self.pos + to_write].copy_from_slice(&bytes[..to_write]);
            self.pos += to_write;
        }

        Ok(())
    }
}

/// Format `[LEVEL] target: message\r\n` into `buf`, truncating.
///
/// The line terminator always survives truncation so the console does not
/// run two records together.
pub fn format_record(
    buf: &mut [u8],
    level: Level,
    target: &str,
    args: &core::fmt::Arguments<'_>,
) -> usize {
    use core::fmt::Write;

    let level_str = match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    };

    if buf.len() < 2 {
        return 0;
    }
    let body_len = buf.len() - 2;
    let pos = {
        let mut writer = BufferWriter { buffer: &mut buf[..body_len], pos: 0 };
        let _ = write!(writer, "[{}] {}: {}", level_str, target, args);
        writer.pos
    };
    buf[pos] = b'\r';
    buf[pos + 1] = b'\n';
    pos + 2
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Install the console logger.
///
/// Returns false when a logger was already installed; the level is still
/// applied so a second boot in the same image keeps working.
pub fn init(sink: &'static dyn ConsoleSink, level: LevelFilter) -> bool {
    SINK.call_once(|| sink);
    let installed = log::set_logger(&LOGGER).is_ok();
    log::set_max_level(level);
    if installed {
        log::info!("[LOGGER] Console logger installed at {}", level);
    } else {
        early_print("[LOGGER] Logger already installed\r\n");
    }
    installed
}

/// Print directly to the console sink (bypass logger for early debug)
pub fn early_print(s: &str) {
    if let Some(sink) = SINK.get() {
        sink.write_bytes(s.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use spin::Mutex;

    struct Capture(Mutex<Vec<u8>>);

    impl ConsoleSink for Capture {
        fn write_bytes(&self, bytes: &[u8]) {
            self.0.lock().extend_from_slice(bytes);
        }
    }

    static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));

    #[test]
    fn test_format_record() {
        let mut buf = [0u8; 64];
        let n = format_record(&mut buf, Level::Warn, "gem", &format_args!("pid {}", 3));
        assert_eq!(&buf[..n], b"[WARN ] gem: pid 3\r\n");
    }

    #[test]
    fn test_format_record_truncates_but_keeps_eol() {
        let mut buf = [0u8; 12];
        let n = format_record(&mut buf, Level::Info, "gem", &format_args!("a long message"));
        assert_eq!(n, 12);
        assert_eq!(&buf[10..12], b"\r\n");
    }

    #[test]
    fn test_init_routes_to_sink() {
        init(&CAPTURE, LevelFilter::Info);
        log::info!(target: "gem", "hello");
        let out = CAPTURE.0.lock();
        let text = core::str::from_utf8(&out).unwrap();
        assert!(text.contains("[INFO ] gem: hello\r\n"));
    }
}

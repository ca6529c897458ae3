//! Logging configuration using tracing

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Log format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format (default for development)
    #[default]
    Pretty,
    /// JSON format (for production/log aggregation)
    Json,
    /// Compact single-line format
    Compact,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to pretty
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level (default: info)
    pub level: String,
    /// Console log format
    pub format: LogFormat,
    /// Include span events (enter/exit)
    pub with_spans: bool,
    /// Include file/line information
    pub with_file: bool,
    /// Include target (module path)
    pub with_target: bool,
    /// Plain-text log file appended to alongside the console
    pub file: Option<PathBuf>,
    /// Log file created only once the caller activates it
    pub deferred_file: Option<DeferredLogFile>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: LogFormat::Pretty,
            with_spans: false,
            with_file: false,
            with_target: true,
            file: None,
            deferred_file: None,
        }
    }
}

impl LogConfig {
    /// Create a new logging configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the log level
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the log format
    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable JSON format
    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    /// Enable span events
    pub fn with_spans(mut self) -> Self {
        self.with_spans = true;
        self
    }

    /// Enable file/line information
    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    /// Also append plain-text records to `path`
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Send plain-text records to `file`, which buffers until activated
    pub fn deferred_log_file(mut self, file: DeferredLogFile) -> Self {
        self.deferred_file = Some(file);
        self
    }
}

#[derive(Debug)]
enum Sink {
    Pending(Vec<u8>),
    Open(File),
    Closed,
}

/// A log file that does not exist until `activate` is called.
///
/// Records written before activation are held in memory and flushed into
/// the file when it opens. If it is never activated nothing touches disk.
#[derive(Debug, Clone)]
pub struct DeferredLogFile {
    path: PathBuf,
    sink: Arc<Mutex<Sink>>,
}

impl DeferredLogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sink: Arc::new(Mutex::new(Sink::Pending(Vec::new()))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file, creating parent directories as needed, and write out
    /// everything buffered so far. Later calls are no-ops.
    ///
    /// On failure the buffer is dropped and further records are discarded.
    pub fn activate(&self) -> io::Result<()> {
        let mut sink = self.lock();
        let buffer = match &mut *sink {
            Sink::Pending(buffer) => std::mem::take(buffer),
            _ => return Ok(()),
        };

        let opened = open_log_file(&self.path).and_then(|mut file| {
            file.write_all(&buffer)?;
            Ok(file)
        });
        match opened {
            Ok(file) => {
                *sink = Sink::Open(file);
                Ok(())
            }
            Err(e) => {
                *sink = Sink::Closed;
                Err(e)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(*self.lock(), Sink::Open(_))
    }

    fn lock(&self) -> MutexGuard<'_, Sink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Writer handed out per record by `DeferredLogFile`
pub struct DeferredWriter<'a> {
    file: &'a DeferredLogFile,
}

impl Write for DeferredWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut *self.file.lock() {
            Sink::Pending(buffer) => {
                buffer.extend_from_slice(buf);
                Ok(buf.len())
            }
            Sink::Open(file) => file.write(buf),
            Sink::Closed => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut *self.file.lock() {
            Sink::Open(file) => file.flush(),
            _ => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for DeferredLogFile {
    type Writer = DeferredWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        DeferredWriter { file: self }
    }
}

/// Initialize the global tracing subscriber with default settings
pub fn init_logging() {
    // No file sink, so opening cannot fail
    let _ = init_logging_with_config(LogConfig::default());
}

/// Initialize the global tracing subscriber with custom configuration.
///
/// Console output uses the configured format; the optional log file always
/// gets plain single-line records without ANSI colors. Fails only if the log
/// file cannot be opened.
pub fn init_logging_with_config(config: LogConfig) -> io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let span_events = if config.with_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let console = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.with_file)
        .with_line_number(config.with_file)
        .with_target(config.with_target);

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = vec![match config.format {
        LogFormat::Json => console.json().boxed(),
        LogFormat::Compact => console.compact().boxed(),
        LogFormat::Pretty => console.pretty().boxed(),
    }];

    if let Some(path) = &config.file {
        let file = open_log_file(path)?;
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(config.with_target)
                .with_writer(Mutex::new(file))
                .boxed(),
        );
    }

    if let Some(deferred) = &config.deferred_file {
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(config.with_target)
                .with_writer(deferred.clone())
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    Ok(())
}

/// Open `path` for appending, creating parent directories as needed
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_builder() {
        let config = LogConfig::new()
            .level("debug")
            .json()
            .with_spans()
            .with_file()
            .log_file("out/scan.log");

        assert_eq!(config.level, "debug");
        assert!(matches!(config.format, LogFormat::Json));
        assert!(config.with_spans);
        assert!(config.with_file);
        assert_eq!(config.file, Some(PathBuf::from("out/scan.log")));
    }

    #[test]
    fn test_format_from_name() {
        assert_eq!(LogFormat::from_name("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::from_name("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::from_name("whatever"), LogFormat::Pretty);
    }

    #[test]
    fn test_open_log_file_creates_parents_and_appends() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("scan.log");

        open_log_file(&path).unwrap().write_all(b"first\n").unwrap();
        open_log_file(&path).unwrap().write_all(b"second\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn test_deferred_file_buffers_until_activated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out").join("scan.log");
        let log = DeferredLogFile::new(&path);

        log.make_writer().write_all(b"validating\n").unwrap();
        assert!(!log.is_active());
        assert!(!path.exists());
        assert!(!tmp.path().join("out").exists());

        log.activate().unwrap();
        log.activate().unwrap();
        log.make_writer().write_all(b"crawling\n").unwrap();

        assert!(log.is_active());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "validating\ncrawling\n");
    }

    #[test]
    fn test_deferred_file_never_activated_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scan.log");
        let config = LogConfig::new().deferred_log_file(DeferredLogFile::new(&path));

        let log = config.deferred_file.as_ref().unwrap();
        log.make_writer().write_all(b"dropped\n").unwrap();
        drop(config);
        assert!(!path.exists());
    }
}

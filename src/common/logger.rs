use crate::common::config::LoggerConfig;
use log::{info, LevelFilter};
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            policy::compound::{
                roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger, CompoundPolicy,
            },
            RollingFileAppender,
        },
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use std::fs;
use std::path::Path;
use std::str::FromStr;

const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} - {l} - {m}\n";
const CONSOLE_PATTERN: &str = "{d(%H:%M:%S)} {h({l:<5})} {m}\n";

/// Fallback logger that writes to stderr when log4rs fails to initialise.
pub struct SimpleLogger;

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= LevelFilter::Info
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Console output goes to stderr at the configured level; every record at
/// that level also lands in a size-rotated log file.
pub fn setup_logger(config: &LoggerConfig) -> Result<log4rs::Handle, Box<dyn std::error::Error>> {
    let level = LevelFilter::from_str(&config.level).unwrap_or(LevelFilter::Info);
    let trigger_file_size = config.file_size * 1024 * 1024;

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();

    let trigger = SizeTrigger::new(trigger_file_size);
    let roller = FixedWindowRoller::builder()
        .base(0)
        .build(&config.archive_pattern, config.file_count)?;
    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

    if let Some(parent) = Path::new(&config.path).parent() {
        fs::create_dir_all(parent)?;
    }

    let logfile = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build(&config.path, Box::new(policy))?;

    let runtime_config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(level)))
                .build("stderr", Box::new(stderr)),
        )
        .build(
            Root::builder()
                .appender("logfile")
                .appender("stderr")
                .build(level),
        )?;

    let handle = log4rs::init_config(runtime_config)?;

    info!(
        "Logger initialized ({}), file: '{}', archive: '{}'",
        level, config.path, config.archive_pattern
    );

    Ok(handle)
}

/// Install the log4rs logger, or [`SimpleLogger`] if that fails.
pub fn init(config: &LoggerConfig) {
    if let Err(e) = setup_logger(config) {
        eprintln!("Failed to initialize logger: {}", e);
        if log::set_boxed_logger(Box::new(SimpleLogger)).is_ok() {
            log::set_max_level(LevelFilter::Info);
        }
    }
}

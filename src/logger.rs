use log::SetLoggerError;
use simplelog::{ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

/// Install a terminal logger for this crate's messages. Fails if a logger is
/// already installed.
pub fn start_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    let config = ConfigBuilder::new()
        .set_location_level(LevelFilter::Error)
        .add_filter_allow_str("rgg")
        .build();
    TermLogger::init(level, config, TerminalMode::Mixed)
}

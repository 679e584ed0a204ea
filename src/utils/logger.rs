//! Rolling-file logging, initialized per persistence root directory.

use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::fs;
use std::path::Path;

const ROLL_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const ROLL_KEEP: u32 = 7;

/// Initialize a rolling `cowstore.log` under `<root>/logs/`, scoped per persistence
/// root rather than a single process-wide logger.
///
/// # Errors
/// Returns an error if the log directory cannot be created or log4rs fails to init.
pub fn init_for_persistence(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = root.join("logs");
    fs::create_dir_all(&log_dir)?;
    let pattern = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
    let log_path = log_dir.join("cowstore.log");
    let roller =
        FixedWindowRoller::builder().build(&format!("{}", log_dir.join("cowstore.{}.log").display()), ROLL_KEEP)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE_BYTES)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(pattern)))
        .build(log_path, Box::new(policy))?;
    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(appender)))
        .build(Root::builder().appender("file").build(LevelFilter::Info))?;
    log4rs::init_config(config)?;
    Ok(())
}

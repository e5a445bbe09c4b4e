use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use crate::config::Config;
use crate::gate::Report;

/// Route `log` records to stderr (warnings and up) and to the configured
/// log file. Best-effort: a log file that cannot be opened is skipped.
pub fn init(config: &Config) {
    let log_config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Never,
    )];
    if let Some(file) = open_append(&config.log_path()) {
        loggers.push(WriteLogger::new(config.log_level(), log_config, file));
    }
    let _ = CombinedLogger::init(loggers);
}

/// Append an outcome record to the configured outcome log.
/// Best-effort: failures are silently ignored (logging must never block the hook).
pub fn log_outcome(config: &Config, report: &Report) {
    let Some(mut file) = open_append(&config.outcome_log_path()) else {
        return;
    };
    let _ = writeln!(file, "{}", outcome_record(report, &timestamp_now()));
}

fn open_append(path: &Path) -> Option<std::fs::File> {
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// One tab-separated line: time, hook, verdict, count, commit, first violation.
fn outcome_record(report: &Report, ts: &str) -> String {
    let first = report
        .violations
        .first()
        .map(|v| v.to_string().replace(['\t', '\n'], " "))
        .unwrap_or_default();
    let commit = report
        .commit
        .as_ref()
        .map(|c| c.id.short().to_string())
        .unwrap_or_default();
    format!(
        "{ts}\t{hook}\t{verdict}\t{count}\t{commit}\t{first}",
        hook = report.hook,
        verdict = report.verdict.as_str(),
        count = report.violations.len(),
    )
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ` for outcome records.
fn timestamp_now() -> String {
    let dur = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    format_timestamp(dur.as_secs())
}

fn format_timestamp(secs: u64) -> String {
    let days = secs / 86400;
    let rem = secs % 86400;
    let h = rem / 3600;
    let m = (rem % 3600) / 60;
    let s = rem % 60;
    let (year, month, day) = epoch_days_to_date(days);
    format!("{year:04}-{month:02}-{day:02}T{h:02}:{m:02}:{s:02}Z")
}

/// Convert days since Unix epoch to (year, month, day).
fn epoch_days_to_date(days: u64) -> (u64, u64, u64) {
    // Civil calendar from days algorithm (Howard Hinnant)
    let z = days + 719468;
    let era = z / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y, m, d)
}

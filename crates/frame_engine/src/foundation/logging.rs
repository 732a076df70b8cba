//! Logging utilities
//!
//! The engine only talks to the `log` facade. The process installs the
//! `env_logger` backend once, before the engine is created, and it stays
//! installed for the rest of the process so teardown messages are still
//! emitted after the renderer is gone.

use std::io::Write;

use chrono::NaiveTime;

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// Defaults to the `trace` level unless `RUST_LOG` says otherwise. Lines are
/// formatted as `[HH:MM:SS] target: message` in local time. Calling this more
/// than once is harmless; only the first call installs the logger.
pub fn init() {
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                clock_time(chrono::Local::now().time()),
                record.target(),
                record.args()
            )
        })
        .try_init();

    if result.is_err() {
        log::trace!("Logger already installed, keeping the existing one");
    }
}

fn clock_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_time_is_zero_padded() {
        let time = NaiveTime::from_hms_opt(9, 5, 3).unwrap();
        assert_eq!(clock_time(time), "09:05:03");
        let time = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap();
        assert_eq!(clock_time(time), "23:59:59");
    }

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
        log::info!("logging initialised twice without panicking");
    }
}

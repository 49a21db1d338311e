use ansi_term::Colour;
use chrono_tz::Tz;
use env_logger::{Builder, Env};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Installs the global logger. Lines look like
/// `[2024-05-01T12:00:00+00:00 INFO spa_static_server::server] ...`, with the
/// level coloured on the terminal. When `log_file` is given an uncoloured
/// copy of every line is appended to it.
pub fn init(timezone: Tz, log_file: Option<&Path>) -> io::Result<()> {
    let log_file: Option<File> = match log_file {
        Some(path) => Some(OpenOptions::new().create(true).append(true).open(path)?),
        None => None,
    };

    Builder::from_env(Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            let timestamp = chrono::Utc::now()
                .with_timezone(&timezone)
                .format("%Y-%m-%dT%H:%M:%S%:z");

            let level = match record.level() {
                log::Level::Error => Colour::Red.paint(record.level().to_string()),
                log::Level::Warn => Colour::Yellow.paint(record.level().to_string()),
                log::Level::Info => Colour::Green.paint(record.level().to_string()),
                log::Level::Debug => Colour::Blue.paint(record.level().to_string()),
                log::Level::Trace => Colour::Purple.paint(record.level().to_string()),
            };

            if let Some(mut file) = log_file.as_ref() {
                // Write failures on the copy are ignored.
                let _ = writeln!(
                    file,
                    "[{} {} {}] {}",
                    timestamp,
                    record.level(),
                    record.module_path().unwrap_or_default(),
                    record.args()
                );
            }

            writeln!(
                buf,
                "[{} {} {}] {}",
                timestamp,
                level,
                record.module_path().unwrap_or_default(),
                record.args()
            )
        })
        .init();

    Ok(())
}

//! Rotating plain-text log sink, rotated once per wall-clock minute.
//!
//! Grounded on `examples/original_source/LogFileWriter.cpp`/`.hpp` (a
//! spdlog-backed rotating sink under `./logs/<YYYY>/<DDD>/`). REDESIGN FLAG
//! in SPEC_FULL.md §9 calls for structured logging through a real logging
//! crate; this implements `log::Log` so it can be registered as a second
//! destination alongside `stderrlog`, writing the same
//! `YYYY-MM-DD HH:MM:SS [LEVEL] MESSAGE` line format to both.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use log::{Log, Metadata, Record};

use crate::time::Ydhms;

/// Identifies the minute boundary a file was opened for: year, day of year,
/// and minute of day. Disambiguates across hour/day/year boundaries, unlike
/// `stamp.minute` alone.
type MinuteKey = (i32, u16, u32);

fn minute_key(stamp: &Ydhms) -> MinuteKey {
    (stamp.year, stamp.day_of_year, stamp.seconds_of_day() / 60)
}

struct Inner {
    root: PathBuf,
    current: Option<(MinuteKey, File)>,
}

/// A `log::Log` implementation that rotates its backing file every minute.
pub struct LogRotator {
    inner: Mutex<Inner>,
}

impl LogRotator {
    /// Create a rotator writing under `root` (typically `./logs`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                root: root.into(),
                current: None,
            }),
        }
    }

    fn dir_for(root: &std::path::Path, stamp: &Ydhms) -> PathBuf {
        root.join(format!("{:04}", stamp.year))
            .join(format!("{:03}", stamp.day_of_year))
    }

    fn filename(stamp: &Ydhms) -> String {
        // Ydhms doesn't carry calendar month/day-of-month, so this uses
        // year/day-of-year/HH/MM/SS rather than the original's
        // year/day-of-year/month/day/HH/MM/SS six-field name.
        format!(
            "log_{:04}_{:03}_{:02}_{:02}_{:02}.log",
            stamp.year, stamp.day_of_year, stamp.hour, stamp.minute, stamp.second,
        )
    }

    fn write_line(&self, stamp: &Ydhms, line: &str) {
        let mut inner = self.inner.lock().expect("log rotator lock poisoned");
        let key = minute_key(stamp);
        let needs_rotate = match &inner.current {
            Some((current_key, _)) => *current_key != key,
            None => true,
        };
        if needs_rotate {
            let dir = Self::dir_for(&inner.root, stamp);
            if fs::create_dir_all(&dir).is_err() {
                return;
            }
            let path = dir.join(Self::filename(stamp));
            if let Ok(f) = File::create(&path) {
                inner.current = Some((key, f));
            } else {
                return;
            }
        }
        if let Some((_, f)) = inner.current.as_mut() {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl Log for LogRotator {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let now = Utc::now();
        let stamp = Ydhms::from_utc(now);
        let line = format!(
            "{} [{}] {}",
            now.format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        );
        self.write_line(&stamp, &line);
    }

    fn flush(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            if let Some((_, f)) = inner.current.as_mut() {
                let _ = f.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_files_by_minute_and_creates_year_doy_dirs() {
        let tmpd = tempfile::tempdir().unwrap();
        let rotator = LogRotator::new(tmpd.path());

        let mut stamp = Ydhms {
            year: 2026,
            day_of_year: 10,
            hour: 1,
            minute: 0,
            second: 0,
        };
        rotator.write_line(&stamp, "first minute");
        stamp.minute = 1;
        rotator.write_line(&stamp, "second minute");

        let dir = tmpd.path().join("2026").join("010");
        let count = fs::read_dir(&dir).unwrap().count();
        assert_eq!(count, 2);
    }

    #[test]
    fn rotates_across_an_hour_boundary_with_same_minute_of_hour() {
        let tmpd = tempfile::tempdir().unwrap();
        let rotator = LogRotator::new(tmpd.path());

        let mut stamp = Ydhms {
            year: 2026,
            day_of_year: 10,
            hour: 3,
            minute: 5,
            second: 0,
        };
        rotator.write_line(&stamp, "hour three");
        stamp.hour = 4;
        rotator.write_line(&stamp, "hour four");

        let dir = tmpd.path().join("2026").join("010");
        let count = fs::read_dir(&dir).unwrap().count();
        assert_eq!(count, 2);
    }
}

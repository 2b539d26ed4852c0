//! Verbatim raw-telemetry capture, rotated once per wall-clock minute.
//!
//! Grounded on `examples/original_source/RecordFileWriter.cpp`/`.hpp`:
//! filenames of the shape `record_<YYYY>_<DDD>_<HH>_<MM>_<SS>.rtlm`, one
//! file opened per minute boundary.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use log::info;

use crate::error::Result;
use crate::time::Ydhms;

/// Writes `sync_word ‖ packet` bytes verbatim to a minute-rotated capture
/// file under `dir`.
/// Identifies the minute boundary a file was opened for: year, day of year,
/// and minute of day. Disambiguates across hour/day/year boundaries, unlike
/// `stamp.minute` alone.
type MinuteKey = (i32, u16, u32);

fn minute_key(stamp: &Ydhms) -> MinuteKey {
    (stamp.year, stamp.day_of_year, stamp.seconds_of_day() / 60)
}

pub struct RawRecorder {
    dir: PathBuf,
    current: Option<(MinuteKey, File)>,
}

impl RawRecorder {
    /// Create a recorder writing under `dir`, which must already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            current: None,
        }
    }

    fn filename(stamp: &Ydhms) -> String {
        format!(
            "record_{:04}_{:03}_{:02}_{:02}_{:02}.rtlm",
            stamp.year, stamp.day_of_year, stamp.hour, stamp.minute, stamp.second
        )
    }

    /// Write one raw frame, rotating to a new file if `stamp`'s minute
    /// differs from the currently open file's.
    pub fn write(&mut self, stamp: &Ydhms, frame: &[u8]) -> Result<()> {
        let key = minute_key(stamp);
        let needs_rotate = match &self.current {
            Some((current_key, _)) => *current_key != key,
            None => true,
        };
        if needs_rotate {
            let path = self.dir.join(Self::filename(stamp));
            info!("rotating raw capture to {}", path.display());
            let f = File::create(&path)?;
            self.current = Some((key, f));
        }
        let (_, f) = self.current.as_mut().expect("just rotated");
        f.write_all(frame)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn stamp(minute: u8, second: u8) -> Ydhms {
        let dt: DateTime<Utc> = "2026-01-02T03:00:00Z".parse().unwrap();
        let mut y = Ydhms::from_utc(dt);
        y.minute = minute;
        y.second = second;
        y
    }

    fn stamp_hm(hour: u8, minute: u8) -> Ydhms {
        let dt: DateTime<Utc> = "2026-01-02T00:00:00Z".parse().unwrap();
        let mut y = Ydhms::from_utc(dt);
        y.hour = hour;
        y.minute = minute;
        y
    }

    #[test]
    fn rotates_on_minute_boundary() -> Result<()> {
        let tmpd = tempfile::tempdir()?;
        let mut rec = RawRecorder::new(tmpd.path());

        rec.write(&stamp(0, 0), b"first")?;
        rec.write(&stamp(0, 30), b"still-minute-zero")?;
        rec.write(&stamp(1, 0), b"new-minute")?;

        let mut entries: Vec<_> = std::fs::read_dir(tmpd.path())?
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        entries.sort();
        assert_eq!(entries.len(), 2);
        Ok(())
    }

    #[test]
    fn rotates_across_an_hour_boundary_with_same_minute_of_hour() -> Result<()> {
        let tmpd = tempfile::tempdir()?;
        let mut rec = RawRecorder::new(tmpd.path());

        // Same minute-of-hour (5) in two different hours: a minute-only key
        // would wrongly treat these as the same file.
        rec.write(&stamp_hm(3, 5), b"hour-three")?;
        rec.write(&stamp_hm(4, 5), b"hour-four")?;

        let entries: Vec<_> = std::fs::read_dir(tmpd.path())?.collect();
        assert_eq!(entries.len(), 2);
        Ok(())
    }
}

//! TAI/Unix time conversion and the year/day-of-year/clock formatting used
//! for file paths and archive headers.
//!
//! Grounded on the constants in the original ground-station `TimeInfo`
//! class: a fixed leap-second count and a fixed TAI-epoch-to-Unix-epoch
//! offset, rather than a dated leap-second table.

use chrono::{DateTime, Datelike, Timelike, Utc};

/// TAI seconds ahead of UTC, held constant for the life of this mission.
///
/// A longer-lived system would need a dated leap-second table; this
/// pipeline only ever runs over a single short rocket flight, so one
/// constant is what the original flew with.
/// TODO: replace with a dated table if this is ever reused across a leap
/// second insertion.
pub const LEAP_SECONDS: u32 = 37;

/// Seconds from the TAI epoch (1958-01-01 00:00:00 UTC) to the Unix epoch.
pub const TAI_EPOCH_OFFSET_TO_UNIX: i64 = 378_691_200;

/// A CCSDS secondary-header timestamp: 32-bit TAI seconds plus a 32-bit
/// subseconds field of which only the high 16 bits are significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaiTimestamp {
    /// Whole TAI seconds since the TAI epoch.
    pub seconds: u32,
    /// Raw 32-bit subseconds field as read from the packet.
    pub subseconds: u32,
}

impl TaiTimestamp {
    /// Parse from the 8-byte secondary header (big-endian seconds then
    /// subseconds).
    pub fn from_secondary_header(buf: &[u8; 8]) -> Self {
        let seconds = u32::from_be_bytes(buf[0..4].try_into().unwrap());
        let subseconds = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        Self { seconds, subseconds }
    }

    /// Fraction of a second, derived from the high 16 bits of `subseconds`.
    pub fn subsecond_fraction(&self) -> f64 {
        let msb16 = (self.subseconds >> 16) & 0xffff;
        msb16 as f64 / 65536.0
    }

    /// Convert to a UTC `DateTime`, dropping the constant leap-second and
    /// TAI-epoch offsets.
    pub fn to_utc(&self) -> DateTime<Utc> {
        let unix_seconds =
            self.seconds as i64 - LEAP_SECONDS as i64 - TAI_EPOCH_OFFSET_TO_UNIX;
        let nanos = (self.subsecond_fraction() * 1e9) as u32;
        DateTime::from_timestamp(unix_seconds, nanos).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Seconds since TAI epoch, as used for `REC_TAI` product metadata.
    pub fn tai_seconds_since_unix_epoch(&self) -> i64 {
        self.seconds as i64 - LEAP_SECONDS as i64 - TAI_EPOCH_OFFSET_TO_UNIX
    }
}

/// Year/day-of-year/clock components used to build product and log paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ydhms {
    /// Four-digit year.
    pub year: i32,
    /// Day of year, 1-366.
    pub day_of_year: u16,
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Minute of hour, 0-59.
    pub minute: u8,
    /// Second of minute, 0-59.
    pub second: u8,
}

impl Ydhms {
    /// Derive from a UTC `DateTime`.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self {
            year: dt.year(),
            day_of_year: dt.ordinal() as u16,
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
            second: dt.second() as u8,
        }
    }

    /// Seconds elapsed since local midnight (`SOD` in the archive header).
    pub fn seconds_of_day(&self) -> u32 {
        self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32
    }

    /// `YYYYDDD` integer used in product filenames and the `YDOY` header key.
    pub fn yyyyddd(&self) -> u32 {
        self.year as u32 * 1000 + self.day_of_year as u32
    }

    /// `HHMMSS` used in product filenames.
    pub fn hhmmss(&self) -> String {
        format!("{:02}{:02}{:02}", self.hour, self.minute, self.second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tai_to_unix_roundtrip_known_epoch() {
        // TAI seconds for 1970-01-01T00:00:00Z is offset + leap seconds.
        let ts = TaiTimestamp {
            seconds: (TAI_EPOCH_OFFSET_TO_UNIX + LEAP_SECONDS as i64) as u32,
            subseconds: 0,
        };
        let utc = ts.to_utc();
        assert_eq!(utc.year(), 1970);
        assert_eq!(utc.ordinal(), 1);
    }

    #[test]
    fn subsecond_fraction_uses_high_word_only() {
        let ts = TaiTimestamp {
            seconds: 0,
            subseconds: 0x8000_0000,
        };
        assert!((ts.subsecond_fraction() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ydhms_formats_filename_fragments() {
        let dt = DateTime::parse_from_rfc3339("2026-02-03T04:05:06Z")
            .unwrap()
            .with_timezone(&Utc);
        let y = Ydhms::from_utc(dt);
        assert_eq!(y.year, 2026);
        assert_eq!(y.hhmmss(), "040506");
        assert_eq!(y.seconds_of_day(), 4 * 3600 + 5 * 60 + 6);
    }
}

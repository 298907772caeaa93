//! MS-DOS packed date and time.
//!
//! ZIP stores modification times as two 16-bit words:
//!
//! - time: `hour << 11 | minute << 5 | second / 2`
//! - date: `(year - 1980) << 9 | month << 5 | day`
//!
//! [`pack_dos_datetime`] and [`unpack_dos_datetime`] are the only places that
//! know about this layout.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Result, ZipError};

const DOS_MIN_YEAR: u16 = 1980;
const DOS_MAX_YEAR: u16 = 1980 + 0x7F;

/// Calendar fields of a DOS timestamp. Seconds have a 2-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeParts {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Pack calendar fields into `(time, date)` words.
///
/// Odd seconds are rounded down, matching the format's 2-second resolution.
pub fn pack_dos_datetime(parts: &DateTimeParts) -> Result<(u16, u16)> {
    if !(DOS_MIN_YEAR..=DOS_MAX_YEAR).contains(&parts.year) {
        return Err(ZipError::InvalidTimestamp("year outside 1980..=2107"));
    }
    if !(1..=12).contains(&parts.month) {
        return Err(ZipError::InvalidTimestamp("month outside 1..=12"));
    }
    if !(1..=31).contains(&parts.day) {
        return Err(ZipError::InvalidTimestamp("day outside 1..=31"));
    }
    if parts.hour > 23 || parts.minute > 59 || parts.second > 59 {
        return Err(ZipError::InvalidTimestamp("time of day out of range"));
    }

    let time = (parts.hour as u16) << 11 | (parts.minute as u16) << 5 | (parts.second as u16) / 2;
    let date = (parts.year - DOS_MIN_YEAR) << 9 | (parts.month as u16) << 5 | parts.day as u16;
    Ok((time, date))
}

/// Unpack `(time, date)` words into calendar fields.
///
/// No validation happens here: archives written by other tools sometimes
/// carry zeroed or out-of-range fields, and listing them should not fail.
pub fn unpack_dos_datetime(time: u16, date: u16) -> DateTimeParts {
    DateTimeParts {
        year: ((date >> 9) & 0x7F) + DOS_MIN_YEAR,
        month: ((date >> 5) & 0x0F) as u8,
        day: (date & 0x1F) as u8,
        hour: ((time >> 11) & 0x1F) as u8,
        minute: ((time >> 5) & 0x3F) as u8,
        second: ((time & 0x1F) * 2) as u8,
    }
}

/// A packed DOS timestamp as stored in local and central headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DosDateTime {
    time: u16,
    date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant.
    pub const EPOCH: DosDateTime = DosDateTime {
        time: 0,
        date: 1 << 5 | 1,
    };

    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Result<Self> {
        let (time, date) = pack_dos_datetime(&DateTimeParts {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })?;
        Ok(Self { time, date })
    }

    /// Wrap raw words read from a header.
    pub fn from_raw(time: u16, date: u16) -> Self {
        Self { time, date }
    }

    /// Convert a system time, interpreted as UTC, clamping to the DOS range.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(d) => d.as_secs(),
            Err(_) => return Self::EPOCH,
        };
        let days = (secs / 86_400) as i64;
        let rem = secs % 86_400;
        let (year, month, day) = civil_from_days(days);

        if year < DOS_MIN_YEAR as i64 {
            return Self::EPOCH;
        }
        if year > DOS_MAX_YEAR as i64 {
            return Self {
                time: 23 << 11 | 59 << 5 | 29,
                date: 0x7F << 9 | 12 << 5 | 31,
            };
        }

        let parts = DateTimeParts {
            year: year as u16,
            month,
            day,
            hour: (rem / 3600) as u8,
            minute: (rem / 60 % 60) as u8,
            second: (rem % 60) as u8,
        };
        // every field is in range by construction
        match pack_dos_datetime(&parts) {
            Ok((time, date)) => Self { time, date },
            Err(_) => Self::EPOCH,
        }
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn time(&self) -> u16 {
        self.time
    }

    pub fn date(&self) -> u16 {
        self.date
    }

    pub fn parts(&self) -> DateTimeParts {
        unpack_dos_datetime(self.time, self.date)
    }
}

impl Default for DosDateTime {
    fn default() -> Self {
        Self::EPOCH
    }
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u8, u8) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

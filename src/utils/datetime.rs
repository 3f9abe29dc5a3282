use std::ops::Neg;

use chrono::{SecondsFormat, TimeZone, Utc};

pub type DateTime = chrono::DateTime<Utc>;

pub fn now() -> DateTime {
    Utc::now()
}

/// Unix epoch, stands in for "never set" timestamps on the wire.
pub fn zero_time() -> DateTime {
    Utc.timestamp(0, 0)
}

pub trait DateTimeExt<Tz: TimeZone> {
    fn duration_offset(self, other: chrono::DateTime<Tz>) -> std::time::Duration;
}

impl DateTimeExt<Utc> for DateTime {
    fn duration_offset(self, other: chrono::DateTime<Utc>) -> std::time::Duration {
        let offset = self.signed_duration_since(other);
        if offset < chrono::Duration::zero() {
            offset.neg().to_std().unwrap_or_default()
        } else {
            offset.to_std().unwrap_or_default()
        }
    }
}

pub trait DateTimeFormatExt {
    fn rfc3339_nano(&self) -> String;
}

impl DateTimeFormatExt for DateTime {
    fn rfc3339_nano(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::Nanos, true)
    }
}

#![forbid(unsafe_code)]

use time::OffsetDateTime;

/// Wall clock in Unix milliseconds, clamped to `0..=i64::MAX`.
pub fn now_ms() -> i64 {
    let ms = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    i64::try_from(ms.max(0)).unwrap_or(i64::MAX)
}

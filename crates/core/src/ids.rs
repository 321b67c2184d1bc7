#![forbid(unsafe_code)]

use crate::error::CoreError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex};
use ulid::{Generator, Ulid};

pub const ID_LEN: usize = 16;
pub const ID_TEXT_LEN: usize = 26;

static GENERATOR: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

/// Opaque 16-byte identifier. The upper 48 bits carry the creation time in
/// milliseconds, so byte order follows creation order. The all-zero value is
/// reserved and never produced by `new_now`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; ID_LEN]);

impl Id {
    pub const ZERO: Id = Id([0u8; ID_LEN]);

    /// Ids minted by one process are strictly increasing, also within a
    /// single millisecond.
    pub fn new_now() -> Self {
        let next = GENERATOR
            .lock()
            .ok()
            .and_then(|mut generator| generator.generate().ok());
        Self(next.unwrap_or_else(Ulid::new).to_bytes())
    }

    /// Mints an id for a fixed timestamp. Random bits still differ per call.
    pub fn with_timestamp_ms(ts_ms: u64) -> Self {
        let random = Ulid::new().random();
        Self(Ulid::from_parts(ts_ms, random).to_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        let raw: [u8; ID_LEN] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidId("id must be exactly 16 bytes"))?;
        let id = Self(raw);
        if id.is_zero() {
            return Err(CoreError::InvalidId("id must not be zero"));
        }
        Ok(id)
    }

    pub fn from_text(value: &str) -> Result<Self, CoreError> {
        let value = value.trim();
        if value.len() != ID_TEXT_LEN {
            return Err(CoreError::InvalidId("id text must be 26 characters"));
        }
        let ulid =
            Ulid::from_string(value).map_err(|_| CoreError::InvalidId("malformed id text"))?;
        Self::from_bytes(&ulid.to_bytes())
    }

    pub fn to_text(&self) -> String {
        Ulid::from_bytes(self.0).to_string()
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Rejects the reserved zero id; used on every create path.
    pub fn ensure_valid(self) -> Result<Self, CoreError> {
        if self.is_zero() {
            return Err(CoreError::InvalidId("id must not be zero"));
        }
        Ok(self)
    }

    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    pub fn timestamp_ms(&self) -> u64 {
        Ulid::from_bytes(self.0).timestamp_ms()
    }
}

/// Unsigned lexicographic comparison reported as -1, 0 or 1.
pub fn compare(a: &Id, b: &Id) -> i32 {
    match a.cmp(b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.to_text())
    }
}

impl FromStr for Id {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_text(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_sort_after_older_ones() {
        let older = Id::with_timestamp_ms(1_000);
        let newer = Id::with_timestamp_ms(2_000);
        assert!(older < newer);
        assert_eq!(compare(&older, &newer), -1);
        assert_eq!(compare(&newer, &older), 1);
        assert_eq!(compare(&older, &older), 0);
        assert_eq!(older.timestamp_ms(), 1_000);
    }

    #[test]
    fn ids_minted_back_to_back_increase() {
        let ids: Vec<Id> = (0..1_000).map(|_| Id::new_now()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn zero_and_wrong_length_are_rejected() {
        assert!(Id::ZERO.is_zero());
        assert!(matches!(
            Id::from_bytes(&[0u8; 16]),
            Err(CoreError::InvalidId(_))
        ));
        assert!(matches!(
            Id::from_bytes(&[1u8; 15]),
            Err(CoreError::InvalidId(_))
        ));
        assert!(Id::ZERO.ensure_valid().is_err());
        assert!(Id::new_now().ensure_valid().is_ok());
    }

    #[test]
    fn text_form_is_26_chars_and_parses_back() {
        let id = Id::new_now();
        let text = id.to_text();
        assert_eq!(text.len(), ID_TEXT_LEN);
        assert_eq!(Id::from_text(&text).unwrap(), id);
        assert!(Id::from_text("not-an-id").is_err());
        assert!(Id::from_text("00000000000000000000000000").is_err());
    }

    #[test]
    fn serde_uses_text_form() {
        let id = Id::new_now();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_text()));
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

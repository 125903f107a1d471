//! CRC32C checksum value and streaming accumulator
//!
//! Object stores publish the CRC32C (Castagnoli) of an object either as a
//! base64 string of the big-endian checksum bytes (the `x-goog-hash:
//! crc32c=...` form) or as plain hex. [`Crc32c`] accepts both and always
//! displays and serializes as 8 lowercase hex digits.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigError, ConfigResult};

/// A CRC32C checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Crc32c(u32);

impl Crc32c {
    /// Wrap a raw checksum value
    pub const fn new(value: u32) -> Self {
        Crc32c(value)
    }

    /// Checksum of a byte slice
    pub fn of(data: &[u8]) -> Self {
        Crc32c(crc32c::crc32c(data))
    }

    /// Parse an 8-digit hex string, with or without a `0x` prefix
    ///
    /// # Examples
    ///
    /// ```rust
    /// use parallel_download::app::Crc32c;
    ///
    /// let crc = Crc32c::from_hex("0xE3069283")?;
    /// assert_eq!(crc.value(), 0xe306_9283);
    /// # Ok::<(), parallel_download::errors::ConfigError>(())
    /// ```
    pub fn from_hex(hex: &str) -> ConfigResult<Self> {
        let digits = hex
            .strip_prefix("0x")
            .or_else(|| hex.strip_prefix("0X"))
            .unwrap_or(hex);

        if digits.is_empty()
            || digits.len() > 8
            || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(ConfigError::invalid(
                "crc32c",
                hex,
                "Expected up to 8 hexadecimal digits",
            ));
        }

        u32::from_str_radix(digits, 16)
            .map(Crc32c)
            .map_err(|e| ConfigError::invalid("crc32c", hex, e.to_string()))
    }

    /// Parse the base64 encoding of the big-endian checksum bytes
    pub fn from_base64(encoded: &str) -> ConfigResult<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ConfigError::invalid("crc32c", encoded, e.to_string()))?;

        let bytes: [u8; 4] = bytes.try_into().map_err(|_| {
            ConfigError::invalid("crc32c", encoded, "Expected exactly 4 decoded bytes")
        })?;

        Ok(Crc32c(u32::from_be_bytes(bytes)))
    }

    /// Lowercase 8-digit hex representation
    pub fn to_hex(&self) -> String {
        format!("{:08x}", self.0)
    }

    /// Base64 encoding of the big-endian checksum bytes
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0.to_be_bytes())
    }

    /// Raw checksum value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Crc32c {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Crc32c {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<u32> for Crc32c {
    fn from(value: u32) -> Self {
        Crc32c(value)
    }
}

impl Serialize for Crc32c {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Crc32c {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string).map_err(serde::de::Error::custom)
    }
}

/// Running CRC32C over bytes fed in increasing offset order
#[derive(Debug, Clone, Default)]
pub struct Crc32cHasher {
    state: u32,
    bytes: u64,
}

impl Crc32cHasher {
    /// Start an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the next window of bytes into the checksum
    pub fn update(&mut self, data: &[u8]) {
        self.state = crc32c::crc32c_append(self.state, data);
        self.bytes += data.len() as u64;
    }

    /// Number of bytes folded so far
    pub fn bytes_processed(&self) -> u64 {
        self.bytes
    }

    /// Final checksum
    pub fn finalize(self) -> Crc32c {
        Crc32c(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vector() {
        // Standard CRC-32C check value
        let crc = Crc32c::of(b"123456789");
        assert_eq!(crc.value(), 0xe306_9283);
        assert_eq!(crc.to_hex(), "e3069283");
        assert_eq!(crc.to_base64(), "4waSgw==");
    }

    #[test]
    fn test_empty_input_is_zero() {
        assert_eq!(Crc32c::of(b""), Crc32c::new(0));
        assert_eq!(Crc32cHasher::new().finalize(), Crc32c::new(0));
        assert_eq!(Crc32c::from_base64("AAAAAA==").unwrap(), Crc32c::new(0));
    }

    #[test]
    fn test_hasher_matches_one_shot() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut hasher = Crc32cHasher::new();
        for window in data.chunks(777) {
            hasher.update(window);
        }
        assert_eq!(hasher.bytes_processed(), data.len() as u64);
        assert_eq!(hasher.finalize(), Crc32c::of(&data));
    }

    #[test]
    fn test_hex_parsing() {
        assert_eq!(Crc32c::from_hex("e3069283").unwrap().value(), 0xe306_9283);
        assert_eq!(Crc32c::from_hex("0XE3069283").unwrap().value(), 0xe306_9283);
        assert_eq!(Crc32c::from_hex("ff").unwrap().value(), 0xff);

        for invalid in ["", "0x", "123456789", "e30692g3", "-1"] {
            assert!(Crc32c::from_hex(invalid).is_err(), "Should reject: {}", invalid);
        }
    }

    #[test]
    fn test_base64_parsing() {
        assert_eq!(Crc32c::from_base64("4waSgw==").unwrap().value(), 0xe306_9283);
        assert!(Crc32c::from_base64("not base64!").is_err());
        assert!(Crc32c::from_base64("AAAAAAAA").is_err()); // 6 bytes
    }

    #[test]
    fn test_serialization() {
        let crc = Crc32c::new(0x0000_00ab);
        let json = serde_json::to_string(&crc).unwrap();
        assert_eq!(json, "\"000000ab\"");

        let deserialized: Crc32c = serde_json::from_str(&json).unwrap();
        assert_eq!(crc, deserialized);
    }
}

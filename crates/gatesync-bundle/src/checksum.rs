//! Checksum algorithms accepted in bundle descriptors.

use std::fmt;
use std::str::FromStr;

use md5::Md5;
use sha2::{Digest, Sha256, Sha512};

use crate::error::BundleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    /// IEEE CRC-32, rendered as 8 hex digits (big-endian).
    Crc32,
    Md5,
    Sha256,
    Sha512,
}

impl ChecksumType {
    /// Lowercase hex digest of `data`.
    pub fn compute(self, data: &[u8]) -> String {
        match self {
            ChecksumType::Crc32 => format!("{:08x}", crc32fast::hash(data)),
            ChecksumType::Md5 => hex::encode(Md5::digest(data)),
            ChecksumType::Sha256 => hex::encode(Sha256::digest(data)),
            ChecksumType::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }

    /// Compare `data` against a declared digest (case-insensitive).
    pub fn verify(self, data: &[u8], expected: &str) -> Result<(), BundleError> {
        let actual = self.compute(data);
        if actual.eq_ignore_ascii_case(expected.trim()) {
            Ok(())
        } else {
            Err(BundleError::ChecksumMismatch {
                expected: expected.to_string(),
                actual,
            })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChecksumType::Crc32 => "crc32",
            ChecksumType::Md5 => "md5",
            ChecksumType::Sha256 => "sha256",
            ChecksumType::Sha512 => "sha512",
        }
    }
}

impl FromStr for ChecksumType {
    type Err = BundleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crc32" => Ok(ChecksumType::Crc32),
            "md5" => Ok(ChecksumType::Md5),
            "sha256" | "sha-256" => Ok(ChecksumType::Sha256),
            "sha512" | "sha-512" => Ok(ChecksumType::Sha512),
            _ => Err(BundleError::UnsupportedChecksum(s.to_string())),
        }
    }
}

impl fmt::Display for ChecksumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc32_matches_known_vector() {
        // CRC-32/IEEE of "123456789".
        assert_eq!(ChecksumType::Crc32.compute(b"123456789"), "cbf43926");
    }

    #[test]
    fn sha256_matches_known_vector() {
        assert_eq!(
            ChecksumType::Sha256.compute(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn md5_matches_known_vector() {
        assert_eq!(
            ChecksumType::Md5.compute(b"abc"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        ChecksumType::Md5
            .verify(b"abc", "900150983CD24FB0D6963F7D28E17F72")
            .unwrap();
    }

    #[test]
    fn sha512_is_128_hex_digits() {
        assert_eq!(ChecksumType::Sha512.compute(b"abc").len(), 128);
    }

    #[test]
    fn verify_ignores_case_and_whitespace() {
        ChecksumType::Crc32.verify(b"123456789", " CBF43926 ").unwrap();
    }

    #[test]
    fn verify_reports_both_digests_on_mismatch() {
        let err = ChecksumType::Crc32.verify(b"123456789", "deadbeef").unwrap_err();
        assert_eq!(
            err,
            BundleError::ChecksumMismatch {
                expected: "deadbeef".to_string(),
                actual: "cbf43926".to_string(),
            }
        );
        assert_eq!(err.code(), 2);
    }

    #[test]
    fn parse_known_and_unknown_types() {
        assert_eq!("CRC32".parse::<ChecksumType>().unwrap(), ChecksumType::Crc32);
        assert_eq!("sha-256".parse::<ChecksumType>().unwrap(), ChecksumType::Sha256);
        assert_eq!("sha512".parse::<ChecksumType>().unwrap(), ChecksumType::Sha512);

        assert_eq!("MD5".parse::<ChecksumType>().unwrap(), ChecksumType::Md5);

        let err = "sha1".parse::<ChecksumType>().unwrap_err();
        assert_eq!(err, BundleError::UnsupportedChecksum("sha1".to_string()));
        assert_eq!(err.code(), 3);
    }
}

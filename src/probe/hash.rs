use base64::Engine;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::io::Cursor;
use std::str::FromStr;

use crate::error::ProbeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgo {
    Mmh3,
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl FromStr for HashAlgo {
    type Err = ProbeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mmh3" => Ok(HashAlgo::Mmh3),
            "md5" => Ok(HashAlgo::Md5),
            "sha1" => Ok(HashAlgo::Sha1),
            "sha256" => Ok(HashAlgo::Sha256),
            "sha512" => Ok(HashAlgo::Sha512),
            other => Err(ProbeError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// MurmurHash3 x86_32, seed 0, as the signed value Python's `mmh3.hash` reports.
pub fn mmh3_32(data: &[u8]) -> Result<i32, ProbeError> {
    let h = murmur3::murmur3_32(&mut Cursor::new(data), 0).map_err(|e| ProbeError::Parse(e.to_string()))?;
    Ok(h as i32)
}

/// Base64 with a newline after every 76 output characters and a trailing newline.
pub fn base64_mime_lines(data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / 76 + 1);
    for chunk in encoded.as_bytes().chunks(76) {
        // base64 output is pure ASCII
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out
}

/// Favicon fingerprint in the form Shodan and friends index.
pub fn favicon_mmh3(icon: &[u8]) -> Result<i32, ProbeError> {
    mmh3_32(base64_mime_lines(icon).as_bytes())
}

/// `None` for an empty body.
pub fn body_hash(body: &[u8], algo: &str) -> Result<Option<String>, ProbeError> {
    let algo: HashAlgo = algo.parse()?;
    if body.is_empty() {
        return Ok(None);
    }
    let digest = match algo {
        HashAlgo::Mmh3 => mmh3_32(body)?.to_string(),
        HashAlgo::Md5 => hex::encode(Md5::digest(body)),
        HashAlgo::Sha1 => hex::encode(Sha1::digest(body)),
        HashAlgo::Sha256 => hex::encode(Sha256::digest(body)),
        HashAlgo::Sha512 => hex::encode(Sha512::digest(body)),
    };
    Ok(Some(digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmh3_matches_reference() {
        assert_eq!(mmh3_32(b"foo").unwrap(), -156908512);
        assert_eq!(mmh3_32(b"hello world").unwrap(), 1586663183);
    }

    #[test]
    fn base64_wraps_at_76() {
        assert_eq!(base64_mime_lines(b"\x00\x01\x02icon"), "AAECaWNvbg==\n");
        let icon: Vec<u8> = (0u8..=255).collect();
        let encoded = base64_mime_lines(&icon);
        assert_eq!(encoded.len(), 349);
        assert!(encoded.lines().all(|l| l.len() <= 76));
    }

    #[test]
    fn favicon_hash_reference() {
        assert_eq!(favicon_mmh3(b"\x00\x01\x02icon").unwrap(), -623927187);
        let icon: Vec<u8> = (0u8..=255).collect();
        assert_eq!(favicon_mmh3(&icon).unwrap(), -757223386);
    }

    #[test]
    fn digests() {
        assert_eq!(body_hash(b"hello", "sha256").unwrap().as_deref(), Some("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"));
        assert_eq!(body_hash(b"hello", "md5").unwrap().as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));
        assert_eq!(body_hash(b"hello", "SHA1").unwrap().as_deref(), Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"));
        assert_eq!(body_hash(b"hello", "sha512").unwrap().map(|h| h.len()), Some(128));
    }

    #[test]
    fn empty_body_and_unknown_algo() {
        assert_eq!(body_hash(b"", "sha256").unwrap(), None);
        assert!(matches!(body_hash(b"x", "crc32"), Err(ProbeError::UnsupportedAlgorithm(_))));
    }
}

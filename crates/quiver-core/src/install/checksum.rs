//! Payload checksum verification.

use sha2::{Digest, Sha256};

use crate::error::{Result, SkillError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Algorithm {
    Sha256,
    Blake3,
}

/// Check `bytes` against `expected`: `sha256:<hex>`, `blake3:<hex>` or bare
/// hex (sha256). Hex comparison is case-insensitive.
pub fn verify(skill_id: &str, expected: &str, bytes: &[u8]) -> Result<()> {
    let (algorithm, hex) = parse(expected)?;
    let actual = digest(algorithm, bytes);
    if !actual.eq_ignore_ascii_case(hex) {
        return Err(SkillError::Checksum {
            skill_id: skill_id.to_string(),
            expected: expected.trim().to_string(),
            actual: match algorithm {
                Algorithm::Sha256 => format!("sha256:{}", actual),
                Algorithm::Blake3 => format!("blake3:{}", actual),
            },
        });
    }
    Ok(())
}

fn parse(expected: &str) -> Result<(Algorithm, &str)> {
    let expected = expected.trim();
    let (algorithm, hex) = match expected.split_once(':') {
        Some((algo, hex)) => match algo.to_ascii_lowercase().as_str() {
            "sha256" => (Algorithm::Sha256, hex),
            "blake3" => (Algorithm::Blake3, hex),
            other => {
                return Err(SkillError::Parse(format!(
                    "Unsupported checksum algorithm: {}",
                    other
                )));
            }
        },
        None => (Algorithm::Sha256, expected),
    };
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(SkillError::Parse(format!("Malformed checksum: {}", expected)));
    }
    Ok((algorithm, hex))
}

fn digest(algorithm: Algorithm, bytes: &[u8]) -> String {
    match algorithm {
        Algorithm::Sha256 => format!("{:x}", Sha256::digest(bytes)),
        Algorithm::Blake3 => blake3::hash(bytes).to_hex().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_sha256_forms() {
        verify("demo", HELLO_SHA256, b"hello").expect("bare hex should verify");
        verify("demo", &format!("sha256:{}", HELLO_SHA256), b"hello").expect("prefixed should verify");
        verify("demo", &format!("SHA256:{}", HELLO_SHA256.to_uppercase()), b"hello")
            .expect("case-insensitive should verify");
    }

    #[test]
    fn test_blake3() {
        let hex = blake3::hash(b"hello").to_hex().to_string();
        verify("demo", &format!("blake3:{}", hex), b"hello").expect("blake3 should verify");
    }

    #[test]
    fn test_mismatch_and_malformed() {
        let err = verify("demo", HELLO_SHA256, b"tampered").expect_err("mismatch");
        assert_eq!(err.kind(), "ChecksumError");

        assert_eq!(verify("demo", "md5:abc", b"x").expect_err("algo").kind(), "ParseError");
        assert_eq!(verify("demo", "abc", b"x").expect_err("short").kind(), "ParseError");
    }
}

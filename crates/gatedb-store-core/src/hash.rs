//! Raw SHA-256 hashing, split out from [`crate::canon`] so backends that
//! already have canonical bytes in hand (e.g. replaying a WAL entry) don't
//! need to re-derive them from a [`gatedb_types::Value`].

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of arbitrary bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut s = String::with_capacity(digest.len() * 2);
    for b in digest {
        s.push_str(&format!("{:02x}", b));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // sha256("") per FIPS 180-4 test vectors.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b85"
        );
    }

    #[test]
    fn is_64_hex_chars() {
        let h = sha256_hex(b"gatedb");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

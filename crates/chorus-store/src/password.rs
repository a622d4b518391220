use std::fmt;

use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256$";

/// SHA-256 digest of a user password
///
/// The credential file stores `sha256$<hex>`. A field without the prefix is a
/// legacy plaintext password; it is hashed on load and written back hashed on
/// the next rewrite.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash([u8; 32]);

impl PasswordHash {
    pub fn new(plain: &str) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(plain.as_bytes()));
        Self(digest)
    }

    /// Interpret a password field read from the credential file
    pub fn from_stored(field: &str) -> Self {
        field
            .strip_prefix(PREFIX)
            .and_then(decode_hex)
            .map_or_else(|| Self::new(field), Self)
    }

    /// Form written to the credential file
    pub fn to_stored(&self) -> String {
        format!("{PREFIX}{}", hex::encode(self.0))
    }

    /// Check a candidate password without short-circuiting on the first differing byte
    pub fn verify(&self, candidate: &str) -> bool {
        let other = Self::new(candidate);
        self.0
            .iter()
            .zip(other.0.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

fn decode_hex(digest: &str) -> Option<[u8; 32]> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(digest, &mut out).ok()?;
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password_only() {
        let hash = PasswordHash::new("hunter2");
        assert!(hash.verify("hunter2"));
        assert!(!hash.verify("Hunter2"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn stored_form_is_stable() {
        let hash = PasswordHash::new("secret");
        let stored = hash.to_stored();

        assert!(stored.starts_with("sha256$"));
        assert_eq!(stored.len(), 7 + 64);
        assert_eq!(PasswordHash::from_stored(&stored), hash);
    }

    #[test]
    fn legacy_plaintext_is_hashed() {
        let hash = PasswordHash::from_stored("plainpass");
        assert!(hash.verify("plainpass"));
    }

    #[test]
    fn malformed_digest_is_treated_as_plaintext() {
        let hash = PasswordHash::from_stored("sha256$zz");
        assert!(hash.verify("sha256$zz"));
    }

    #[test]
    fn uppercase_digest_is_accepted() {
        let hash = PasswordHash::new("secret");
        let stored = format!("sha256${}", hex::encode_upper(Sha256::digest(b"secret")));
        assert_eq!(PasswordHash::from_stored(&stored), hash);
    }

    #[test]
    fn short_digest_is_treated_as_plaintext() {
        let stored = format!("sha256${}", &PasswordHash::new("secret").to_stored()[7..70]);
        assert!(PasswordHash::from_stored(&stored).verify(&stored));
    }

    #[test]
    fn debug_does_not_leak() {
        assert_eq!(format!("{:?}", PasswordHash::new("x")), "PasswordHash([REDACTED])");
    }
}

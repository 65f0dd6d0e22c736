use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use rand_core::{OsRng, RngCore};

/// Argon2id memory cost in KiB (64 MiB).
pub const MEMORY_COST_KIB: u32 = 64 * 1024;
/// Argon2id pass count.
pub const ITERATIONS: u32 = 3;
/// Argon2id lanes.
pub const PARALLELISM: u32 = 2;
/// Salt length in bytes.
pub const SALT_LEN: usize = 16;
/// Derived key length in bytes.
pub const KEY_LEN: usize = 32;

/// Separates the salt and key segments of a serialized credential.
pub const DELIMITER: char = '$';

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("malformed credential: {0}")]
    Malformed(&'static str),

    #[error("key derivation failed: {0}")]
    Kdf(String),
}

/// Hash a password into `base64(salt)$base64(key)` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(password.as_bytes(), &salt)?;

    Ok(format!("{}{}{}", B64.encode(salt), DELIMITER, B64.encode(key)))
}

/// Check `password` against a credential produced by [`hash_password`].
///
/// Returns `Ok(false)` on mismatch and `Err` only when the stored credential
/// cannot be parsed.
pub fn verify_password(password: &str, credential: &str) -> Result<bool, CredentialError> {
    let segments: Vec<&str> = credential.split(DELIMITER).collect();
    let [salt_b64, key_b64] = segments.as_slice() else {
        return Err(CredentialError::Malformed("expected exactly two segments"));
    };

    let salt = B64
        .decode(salt_b64)
        .map_err(|_| CredentialError::Malformed("salt is not valid base64"))?;
    let stored = B64
        .decode(key_b64)
        .map_err(|_| CredentialError::Malformed("key is not valid base64"))?;

    if salt.len() != SALT_LEN || stored.len() != KEY_LEN {
        return Err(CredentialError::Malformed("unexpected segment length"));
    }

    let computed = derive_key(password.as_bytes(), &salt)?;

    Ok(constant_time_eq(&computed, &stored))
}

fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN], CredentialError> {
    let params = Params::new(MEMORY_COST_KIB, ITERATIONS, PARALLELISM, Some(KEY_LEN))
        .map_err(|e| CredentialError::Kdf(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| CredentialError::Kdf(e.to_string()))?;
    Ok(key)
}

/// Compare without short-circuiting on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    std::hint::black_box(diff) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let credential = hash_password("correct-horse-battery-staple").unwrap();

        assert!(verify_password("correct-horse-battery-staple", &credential).unwrap());
        assert!(!verify_password("correct-horse-battery-stapler", &credential).unwrap());
    }

    #[test]
    fn fresh_salt_every_time() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);

        let salt_a = a.split(DELIMITER).next().unwrap();
        let salt_b = b.split(DELIMITER).next().unwrap();
        assert_ne!(salt_a, salt_b);
    }

    #[test]
    fn credential_layout() {
        let credential = hash_password("hunter2").unwrap();
        let (salt, key) = credential.split_once(DELIMITER).unwrap();

        assert_eq!(B64.decode(salt).unwrap().len(), SALT_LEN);
        assert_eq!(B64.decode(key).unwrap().len(), KEY_LEN);
    }

    #[test]
    fn malformed_credentials_are_rejected() {
        for bad in [
            "no-delimiter",
            "a$b$c",
            "!!!$AAAA",
            "AAAAAAAAAAAAAAAAAAAAAA$***",
            "AAAA$AAAA",
        ] {
            let result = verify_password("pw", bad);
            assert!(
                matches!(result, Err(CredentialError::Malformed(_))),
                "{bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn comparison_handles_length_mismatch() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}

/// Blog Crypto Library
///
/// Password credentials: Argon2id over a random 16-byte salt, stored as
/// `base64(salt)$base64(key)`. Cost parameters are fixed constants.
pub mod password;

pub use password::{CredentialError, hash_password, verify_password};

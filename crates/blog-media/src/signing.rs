use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a signed access URL (7 days).
pub const URL_TTL_SECS: i64 = 604_800;

/// Signs and checks `/media/{key}?expires=..&signature=..` URLs.
///
/// The signature is `hex(HMAC-SHA256(secret, "{key}:{expires}"))`.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    public_base: String,
}

impl UrlSigner {
    pub fn new(secret: impl Into<Vec<u8>>, public_base: &str) -> Self {
        Self {
            secret: secret.into(),
            public_base: public_base.trim_end_matches('/').to_string(),
        }
    }

    /// URL for `key`, valid for [`URL_TTL_SECS`] from now.
    pub fn url(&self, key: &str) -> String {
        self.url_expiring_at(key, Utc::now().timestamp() + URL_TTL_SECS)
    }

    pub fn url_expiring_at(&self, key: &str, expires: i64) -> String {
        format!(
            "{}/media/{}?expires={}&signature={}",
            self.public_base,
            key,
            expires,
            self.signature(key, expires)
        )
    }

    fn mac(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(format!("{key}:{expires}").as_bytes());
        mac
    }

    pub fn signature(&self, key: &str, expires: i64) -> String {
        hex::encode(self.mac(key, expires).finalize().into_bytes())
    }

    /// True when `signature` matches and `expires` is not in the past.
    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> bool {
        self.verify_at(key, expires, signature, Utc::now().timestamp())
    }

    pub fn verify_at(&self, key: &str, expires: i64, signature: &str, now: i64) -> bool {
        if expires < now {
            return false;
        }
        let Ok(provided) = hex::decode(signature) else {
            return false;
        };
        self.mac(key, expires).verify_slice(&provided).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> UrlSigner {
        UrlSigner::new("test-media-secret", "http://localhost:12346/")
    }

    #[test]
    fn url_shape() {
        let url = signer().url_expiring_at("abc-cat.png", 1_700_000_000);
        assert!(url.starts_with("http://localhost:12346/media/abc-cat.png?expires=1700000000&signature="));
        let sig = url.rsplit("signature=").next().unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn fresh_url_is_valid_for_seven_days() {
        let s = signer();
        let now = Utc::now().timestamp();
        let expires = now + URL_TTL_SECS;
        let sig = s.signature("k", expires);

        assert!(s.verify_at("k", expires, &sig, now));
        assert!(s.verify_at("k", expires, &sig, expires));
        assert!(!s.verify_at("k", expires, &sig, expires + 1));
    }

    #[test]
    fn tampering_is_detected() {
        let s = signer();
        let expires = Utc::now().timestamp() + 60;
        let sig = s.signature("k", expires);

        assert!(!s.verify("other", expires, &sig));
        assert!(!s.verify("k", expires + 1, &sig));
        assert!(!s.verify("k", expires, "not-hex"));
        assert!(!UrlSigner::new("different", "http://x").verify("k", expires, &sig));
    }
}

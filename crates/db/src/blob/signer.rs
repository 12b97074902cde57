use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("link expired")]
    Expired,
    #[error("invalid signature")]
    Invalid,
}

/// Signs and verifies blob retrieval links.
///
/// Links have the form
/// `{base_url}/api/blobs/{key}?expires={unix}&signature={hex}` where the
/// signature is HMAC-SHA256 over `"{key}\n{expires}"`.
#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
    base_url: String,
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            secret: secret.as_ref().to_vec(),
            base_url,
        }
    }

    fn mac(&self, key: &str, expires: i64) -> HmacSha256 {
        let mut mac = match HmacSha256::new_from_slice(&self.secret) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts any key length"),
        };
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        mac
    }

    /// Hex signature for `key` valid until `expires`.
    pub fn sign(&self, key: &str, expires: i64) -> String {
        hex::encode(self.mac(key, expires).finalize().into_bytes())
    }

    pub fn presign(&self, key: &str, ttl_secs: u64, now: i64) -> String {
        let expires = now.saturating_add(ttl_secs as i64);
        let path = key
            .split('/')
            .map(|seg| urlencoding::encode(seg).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/api/blobs/{}?expires={}&signature={}",
            self.base_url,
            path,
            expires,
            self.sign(key, expires)
        )
    }

    /// Constant-time check of `signature`, then expiry.
    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: i64,
    ) -> Result<(), SignatureError> {
        let provided = hex::decode(signature).map_err(|_| SignatureError::Invalid)?;
        self.mac(key, expires)
            .verify_slice(&provided)
            .map_err(|_| SignatureError::Invalid)?;
        if now > expires {
            return Err(SignatureError::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_param<'a>(url: &'a str, name: &str) -> &'a str {
        let query = url.split_once('?').unwrap().1;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix(&format!("{name}=")))
            .unwrap()
    }

    #[test]
    fn test_presign_then_verify() {
        let signer = UrlSigner::new("secret", "http://localhost:8080/");
        let url = signer.presign("resumes/demo_user/resume_1.pdf", 3600, 1_000);
        assert!(url.starts_with("http://localhost:8080/api/blobs/resumes/demo_user/resume_1.pdf?"));
        let expires: i64 = query_param(&url, "expires").parse().unwrap();
        assert_eq!(expires, 4_600);
        let sig = query_param(&url, "signature");
        assert_eq!(
            signer.verify("resumes/demo_user/resume_1.pdf", expires, sig, 2_000),
            Ok(())
        );
    }

    #[test]
    fn test_tampering_and_expiry_rejected() {
        let signer = UrlSigner::new("secret", "http://x");
        let sig = signer.sign("a/b.txt", 100);
        assert_eq!(
            signer.verify("a/c.txt", 100, &sig, 50),
            Err(SignatureError::Invalid)
        );
        assert_eq!(
            signer.verify("a/b.txt", 101, &sig, 50),
            Err(SignatureError::Invalid)
        );
        assert_eq!(
            signer.verify("a/b.txt", 100, "zz-not-hex", 50),
            Err(SignatureError::Invalid)
        );
        assert_eq!(
            signer.verify("a/b.txt", 100, &sig, 101),
            Err(SignatureError::Expired)
        );

        let other = UrlSigner::new("other-secret", "http://x");
        assert_eq!(
            other.verify("a/b.txt", 100, &sig, 50),
            Err(SignatureError::Invalid)
        );
    }

    #[test]
    fn test_key_segments_are_percent_encoded() {
        let signer = UrlSigner::new("s", "http://x");
        let url = signer.presign("resumes/jane doe/resume_1.pdf", 10, 0);
        assert!(url.contains("/api/blobs/resumes/jane%20doe/resume_1.pdf?"));
    }
}

//! Request signing for the provider's REST API.
//!
//! The provider authenticates requests with a draft-cavage HTTP signature:
//! an RSA-SHA256 signature over `date`, `(request-target)`, and `host`,
//! extended with content headers for bodied requests. The key identifier is
//! `<tenancy>/<user>/<fingerprint>`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::{Digest, Sha256};

use crate::config::ConfigError;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Signs API requests with the configured identity's RSA key.
#[derive(Clone)]
pub(super) struct RequestSigner {
    key_id: String,
    signing_key: SigningKey<Sha256>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of debug output.
        f.debug_struct("RequestSigner")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// Headers produced for one signed request.
pub(super) struct SignedRequest {
    /// RFC 7231 date header value the signature covers.
    pub(super) date: String,
    /// `Authorization: Signature ...` header value.
    pub(super) authorization: String,
    /// Content headers, present only for bodied requests.
    pub(super) body_headers: Option<BodyHeaders>,
}

/// Content headers covered by the signature of a bodied request.
pub(super) struct BodyHeaders {
    /// Body length in bytes.
    pub(super) content_length: String,
    /// Always `application/json` for this driver.
    pub(super) content_type: String,
    /// Base64 SHA-256 digest of the body.
    pub(super) content_sha256: String,
}

impl RequestSigner {
    /// Builds a signer from the identity configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidKey`] when the key material cannot be
    /// parsed or decrypted.
    pub(super) fn new(
        tenancy_id: &str,
        user_id: &str,
        fingerprint: &str,
        private_key_pem: &str,
        passphrase: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let private_key = parse_private_key(private_key_pem, passphrase)?;
        Ok(Self {
            key_id: format!("{tenancy_id}/{user_id}/{fingerprint}"),
            signing_key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// Signs one request, returning the headers to attach.
    ///
    /// `method` is the lowercase HTTP method; `path_and_query` is the request
    /// target without scheme or host.
    pub(super) fn sign(
        &self,
        method: &str,
        path_and_query: &str,
        host: &str,
        body: Option<&[u8]>,
    ) -> SignedRequest {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let mut header_names = vec!["date", "(request-target)", "host"];
        let mut lines = vec![
            format!("date: {date}"),
            format!("(request-target): {method} {path_and_query}"),
            format!("host: {host}"),
        ];

        let body_headers = body.map(|payload| {
            let headers = BodyHeaders {
                content_length: payload.len().to_string(),
                content_type: JSON_CONTENT_TYPE.to_owned(),
                content_sha256: BASE64.encode(Sha256::digest(payload)),
            };
            header_names.extend(["content-length", "content-type", "x-content-sha256"]);
            lines.push(format!("content-length: {}", headers.content_length));
            lines.push(format!("content-type: {}", headers.content_type));
            lines.push(format!("x-content-sha256: {}", headers.content_sha256));
            headers
        });

        let signing_string = lines.join("\n");
        let signature = self.signing_key.sign(signing_string.as_bytes());
        let authorization = format!(
            "Signature version=\"1\",keyId=\"{key_id}\",algorithm=\"rsa-sha256\",\
             headers=\"{headers}\",signature=\"{signature}\"",
            key_id = self.key_id,
            headers = header_names.join(" "),
            signature = BASE64.encode(signature.to_bytes()),
        );

        SignedRequest {
            date,
            authorization,
            body_headers,
        }
    }
}

fn parse_private_key(pem: &str, passphrase: Option<&str>) -> Result<RsaPrivateKey, ConfigError> {
    if pem.contains("BEGIN ENCRYPTED PRIVATE KEY") {
        let passphrase = passphrase.filter(|value| !value.is_empty()).ok_or_else(|| {
            ConfigError::InvalidKey(String::from(
                "key is encrypted but no passphrase was configured",
            ))
        })?;
        return decrypt_pkcs8(pem, passphrase);
    }
    if pem.contains("BEGIN RSA PRIVATE KEY") {
        return RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|err| ConfigError::InvalidKey(err.to_string()));
    }
    RsaPrivateKey::from_pkcs8_pem(pem).map_err(|err| ConfigError::InvalidKey(err.to_string()))
}

fn decrypt_pkcs8(pem: &str, passphrase: &str) -> Result<RsaPrivateKey, ConfigError> {
    let (_, document) =
        pkcs8::Document::from_pem(pem).map_err(|err| ConfigError::InvalidKey(err.to_string()))?;
    let info = pkcs8::EncryptedPrivateKeyInfo::try_from(document.as_bytes())
        .map_err(|err| ConfigError::InvalidKey(err.to_string()))?;
    let decrypted = info
        .decrypt(passphrase)
        .map_err(|err| ConfigError::InvalidKey(err.to_string()))?;
    RsaPrivateKey::from_pkcs8_der(decrypted.as_bytes())
        .map_err(|err| ConfigError::InvalidKey(err.to_string()))
}

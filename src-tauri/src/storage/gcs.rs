//! Firebase / Google Cloud Storage bucket accessed with a service account.

use super::{validate_blob_name, BlobStore, SignedUrl, StorageError};
use crate::config::ServiceAccount;
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

const STORAGE_HOST: &str = "https://storage.googleapis.com";
const STORAGE_SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";

/// Cached OAuth access token with expiry (unix seconds).
struct CachedToken {
    token: String,
    expires_at: i64,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct GcsBlobStore {
    account: ServiceAccount,
    bucket: String,
    key: EncodingKey,
    token: Mutex<Option<CachedToken>>,
}

impl GcsBlobStore {
    pub fn new(account: ServiceAccount, bucket: impl Into<String>) -> Result<Self, StorageError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| StorageError::Auth(format!("invalid private key: {}", e)))?;
        Ok(Self {
            account,
            bucket: bucket.into(),
            key,
            token: Mutex::new(None),
        })
    }

    fn cached_token(&self, now: i64) -> Option<String> {
        self.token
            .lock()
            .as_ref()
            .filter(|cached| now + 60 < cached.expires_at)
            .map(|cached| cached.token.clone())
    }

    /// Exchange a signed JWT assertion for an access token, reusing the cached
    /// one until a minute before it expires.
    async fn access_token(&self) -> Result<String, StorageError> {
        let now = Utc::now().timestamp();
        if let Some(token) = self.cached_token(now) {
            return Ok(token);
        }

        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: STORAGE_SCOPE,
            aud: &self.account.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.account.private_key_id.clone());
        let assertion = jsonwebtoken::encode(&header, &claims, &self.key)
            .map_err(|e| StorageError::Auth(e.to_string()))?;

        let resp = Client::new()
            .post(&self.account.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!(
                "token exchange failed: {} - {}",
                status, text
            )));
        }
        let data: TokenResponse = resp.json().await?;

        *self.token.lock() = Some(CachedToken {
            token: data.access_token.clone(),
            expires_at: now + data.expires_in,
        });
        Ok(data.access_token)
    }

    fn object_url(&self, name: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(STORAGE_HOST).map_err(|e| StorageError::Auth(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidName(name.to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o", name]);
        Ok(url)
    }

    fn upload_url(&self, name: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(STORAGE_HOST).map_err(|e| StorageError::Auth(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidName(name.to_string()))?
            .pop_if_empty()
            .extend(["upload", "storage", "v1", "b", self.bucket.as_str(), "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", name);
        Ok(url)
    }

    /// `https://storage.googleapis.com/<bucket>/<object>`, the resource a V2
    /// signature covers.
    fn resource_url(&self, name: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(STORAGE_HOST).map_err(|e| StorageError::Auth(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidName(name.to_string()))?
            .pop_if_empty()
            .extend([self.bucket.as_str(), name]);
        Ok(url)
    }

    async fn check(resp: reqwest::Response, name: &str) -> Result<reqwest::Response, StorageError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(name.to_string()));
        }
        let message = resp.text().await.unwrap_or_default();
        Err(StorageError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// V2 signed URLs want standard base64; the JWT signer emits URL-safe,
/// unpadded base64.
fn to_standard_base64(url_safe: &str) -> Result<String, StorageError> {
    let raw = URL_SAFE_NO_PAD
        .decode(url_safe)
        .map_err(|e| StorageError::Auth(format!("malformed signature: {}", e)))?;
    Ok(STANDARD.encode(raw))
}

fn v2_string_to_sign(expires: i64, canonical_resource: &str) -> String {
    format!("GET\n\n\n{}\n{}", expires, canonical_resource)
}

#[async_trait]
impl BlobStore for GcsBlobStore {
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_blob_name(name)?;
        let token = self.access_token().await?;
        let resp = Client::new()
            .post(self.upload_url(name)?)
            .bearer_auth(token)
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(bytes.to_vec())
            .send()
            .await?;
        Self::check(resp, name).await?;
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        validate_blob_name(name)?;
        let token = self.access_token().await?;
        let mut url = self.object_url(name)?;
        url.query_pairs_mut().append_pair("alt", "media");
        let resp = Client::new().get(url).bearer_auth(token).send().await?;
        let resp = Self::check(resp, name).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    async fn signed_url(
        &self,
        name: &str,
        expires_in: Duration,
    ) -> Result<SignedUrl, StorageError> {
        validate_blob_name(name)?;
        let expires_at = Utc::now() + expires_in;
        let expires = expires_at.timestamp();
        let mut url = self.resource_url(name)?;
        let string_to_sign = v2_string_to_sign(expires, url.path());
        let signature =
            jsonwebtoken::crypto::sign(string_to_sign.as_bytes(), &self.key, Algorithm::RS256)
                .map_err(|e| StorageError::Auth(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("GoogleAccessId", &self.account.client_email)
            .append_pair("Expires", &expires.to_string())
            .append_pair("Signature", &to_standard_base64(&signature)?);
        Ok(SignedUrl {
            url: url.to_string(),
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::DecodingKey;

    const PRIVATE_KEY: &str = include_str!("testdata/service_account_key.pem");
    const PUBLIC_KEY: &str = include_str!("testdata/service_account_pub.pem");

    fn store() -> GcsBlobStore {
        let account = ServiceAccount {
            account_type: "service_account".into(),
            project_id: "transfer-master".into(),
            private_key_id: "key-1".into(),
            private_key: PRIVATE_KEY.into(),
            client_email: "uploader@transfer-master.iam.gserviceaccount.com".into(),
            client_id: "1234".into(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
            auth_provider_x509_cert_url: "https://www.googleapis.com/oauth2/v1/certs".into(),
            client_x509_cert_url: String::new(),
        };
        GcsBlobStore::new(account, "transfer-master.appspot.com").unwrap()
    }

    #[test]
    fn test_to_standard_base64() {
        assert_eq!(to_standard_base64("-_8").unwrap(), "+/8=");
        assert_eq!(to_standard_base64("YWJj").unwrap(), "YWJj");
        assert!(to_standard_base64("not base64!").is_err());
    }

    #[test]
    fn test_string_to_sign_layout() {
        assert_eq!(
            v2_string_to_sign(1700000000, "/bucket/CISC%20110.txt"),
            "GET\n\n\n1700000000\n/bucket/CISC%20110.txt"
        );
    }

    #[test]
    fn test_rejects_invalid_private_key() {
        let mut account = store().account;
        account.private_key = "not a key".into();
        assert!(matches!(
            GcsBlobStore::new(account, "bucket"),
            Err(StorageError::Auth(_))
        ));
    }

    #[test]
    fn test_url_shapes_encode_names() {
        let store = store();
        assert_eq!(
            store.object_url("CISC 110.txt").unwrap().as_str(),
            "https://storage.googleapis.com/storage/v1/b/transfer-master.appspot.com/o/CISC%20110.txt"
        );
        assert_eq!(
            store.upload_url("CISC 110.txt").unwrap().as_str(),
            "https://storage.googleapis.com/upload/storage/v1/b/transfer-master.appspot.com/o\
             ?uploadType=media&name=CISC+110.txt"
        );
        assert_eq!(
            store.resource_url("CISC 110.txt").unwrap().as_str(),
            "https://storage.googleapis.com/transfer-master.appspot.com/CISC%20110.txt"
        );
    }

    #[tokio::test]
    async fn test_signed_url_verifies_until_expiry() {
        let store = store();
        let signed = store
            .signed_url("CISC 110.txt", Duration::days(365))
            .await
            .unwrap();
        let url = Url::parse(&signed.url).unwrap();
        assert_eq!(url.path(), "/transfer-master.appspot.com/CISC%20110.txt");

        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(
            query["GoogleAccessId"],
            "uploader@transfer-master.iam.gserviceaccount.com"
        );
        let expires: i64 = query["Expires"].parse().unwrap();
        assert_eq!(expires, signed.expires_at.timestamp());
        let days = (signed.expires_at - Utc::now()).num_days();
        assert!((364..=365).contains(&days));

        let signature = URL_SAFE_NO_PAD.encode(STANDARD.decode(&query["Signature"]).unwrap());
        let public = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap();
        let message = v2_string_to_sign(expires, url.path());
        assert!(jsonwebtoken::crypto::verify(
            &signature,
            message.as_bytes(),
            &public,
            Algorithm::RS256
        )
        .unwrap());

        let tampered = v2_string_to_sign(expires + 1, url.path());
        assert!(!jsonwebtoken::crypto::verify(
            &signature,
            tampered.as_bytes(),
            &public,
            Algorithm::RS256
        )
        .unwrap());
    }

    #[tokio::test]
    async fn test_signed_url_rejects_path_names() {
        assert!(matches!(
            store().signed_url("../secrets.toml", Duration::days(1)).await,
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn test_cached_token_expires_a_minute_early() {
        let store = store();
        let now = 1_700_000_000;
        assert!(store.cached_token(now).is_none());

        *store.token.lock() = Some(CachedToken {
            token: "ya29.token".into(),
            expires_at: now + 3600,
        });
        assert_eq!(store.cached_token(now).as_deref(), Some("ya29.token"));
        assert_eq!(store.cached_token(now + 3539).as_deref(), Some("ya29.token"));
        assert!(store.cached_token(now + 3540).is_none());
        assert!(store.cached_token(now + 3600).is_none());
    }
}

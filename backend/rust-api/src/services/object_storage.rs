use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::ObjectStorageSettings;
use crate::models::course::MediaRef;

type HmacSha256 = Hmac<Sha256>;

const AWS_URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Decoded `data:<mime>;base64,<payload>` upload.
#[derive(Debug, PartialEq, Eq)]
pub struct DataUrl {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl DataUrl {
    pub fn parse(input: &str) -> Result<Self> {
        let rest = input
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("Expected a data URL"))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| anyhow!("Malformed data URL"))?;
        let content_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| anyhow!("Data URL must be base64 encoded"))?;
        if content_type.is_empty() {
            bail!("Data URL is missing its media type");
        }
        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .context("Invalid base64 payload")?;
        Ok(Self {
            content_type: content_type.to_string(),
            bytes,
        })
    }

    pub fn extension(&self) -> &str {
        self.content_type
            .rsplit('/')
            .next()
            .filter(|ext| !ext.is_empty())
            .unwrap_or("bin")
    }
}

/// S3-compatible storage client signing requests with SigV4.
#[derive(Clone, Debug)]
pub struct ObjectStorageClient {
    bucket: String,
    region: String,
    endpoint: Url,
    access_key: String,
    secret_key: String,
    prefix: String,
    http: Client,
}

impl ObjectStorageClient {
    pub fn new(settings: ObjectStorageSettings, http: Client) -> Result<Self> {
        let endpoint = settings
            .endpoint
            .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", settings.region));

        let endpoint = Url::parse(&endpoint).context("Invalid object storage endpoint URL")?;
        if endpoint.host_str().is_none() {
            bail!("Object storage endpoint must include a host");
        }

        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "prod".to_string());
        if app_env == "prod" && endpoint.scheme() != "https" {
            bail!(
                "Object storage endpoint must use HTTPS in production mode. Got: {}",
                endpoint.scheme()
            );
        }
        if endpoint.scheme() != "https" && endpoint.scheme() != "http" {
            bail!(
                "Invalid endpoint scheme: {}. Must be http or https.",
                endpoint.scheme()
            );
        }

        Ok(Self {
            bucket: settings.bucket,
            region: settings.region,
            access_key: settings.access_key,
            secret_key: settings.secret_key,
            endpoint,
            prefix: sanitize_prefix(&settings.key_prefix),
            http,
        })
    }

    /// Stores `bytes` under a fresh key in `folder` and returns where it lives.
    pub async fn upload(&self, folder: &str, upload: DataUrl) -> Result<MediaRef> {
        let key = self.full_key(&format!(
            "{}/{}.{}",
            folder.trim_matches('/'),
            uuid::Uuid::new_v4(),
            upload.extension()
        ));
        self.send(Method::PUT, &key, upload.bytes, Some(&upload.content_type))
            .await
            .with_context(|| format!("Failed to upload object {}", key))?;

        tracing::info!(key = %key, "Object uploaded");
        Ok(MediaRef {
            bucket: self.bucket.clone(),
            location: self.object_url(&key).to_string(),
            key,
        })
    }

    /// `key` is the full key as returned by [`ObjectStorageClient::upload`].
    pub async fn delete(&self, key: &str) -> Result<()> {
        let key = key.trim_matches('/');
        if !self.prefix.is_empty() && !key.starts_with(&self.prefix) {
            bail!("Key {} is outside the managed prefix", key);
        }
        self.send(Method::DELETE, key, Vec::new(), None)
            .await
            .with_context(|| format!("Failed to delete object {}", key))?;
        tracing::info!(key = %key, "Object deleted");
        Ok(())
    }

    async fn send(
        &self,
        method: Method,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        let canonical_uri = self.canonical_uri(object_key);
        let payload_hash = hex::encode(Sha256::digest(&bytes));
        let now = Utc::now();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);

        let host = self
            .endpoint
            .host_str()
            .ok_or_else(|| anyhow!("Object storage endpoint missing host"))?
            .to_lowercase();

        let canonical_headers = format!(
            "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
            host, payload_hash, amz_date
        );
        let signed_headers = "host;x-amz-content-sha256;x-amz-date";

        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let hashed_canonical_request = hex::encode(Sha256::digest(canonical_request.as_bytes()));
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date, scope, hashed_canonical_request
        );

        let signing_key = derive_signing_key(&self.secret_key, &date_stamp, &self.region, "s3")?;
        let signature = hex::encode(hmac_sign(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            self.access_key, scope, signed_headers, signature
        );

        let mut request = self
            .http
            .request(method, self.object_url(object_key))
            .header("Authorization", authorization)
            .header("x-amz-date", amz_date)
            .header("x-amz-content-sha256", payload_hash);
        if let Some(content_type) = content_type {
            request = request.header("content-type", content_type);
        }

        request
            .body(bytes)
            .send()
            .await
            .context("Object storage request failed")?
            .error_for_status()
            .context("Object storage returned error status")?;

        Ok(())
    }

    fn object_url(&self, key: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.set_path(&self.canonical_uri(key));
        url
    }

    fn full_key(&self, key: &str) -> String {
        let cleaned = key.trim_matches('/');
        if self.prefix.is_empty() {
            cleaned.to_string()
        } else if cleaned.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{}", self.prefix, cleaned)
        }
    }

    fn canonical_uri(&self, key: &str) -> String {
        let encoded_key = key
            .split('/')
            .map(|segment| utf8_percent_encode(segment, AWS_URI_ENCODE_SET).to_string())
            .collect::<Vec<_>>()
            .join("/");

        format!("/{}/{}", self.bucket, encoded_key)
    }
}

fn sanitize_prefix(prefix: &str) -> String {
    prefix
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> Result<Vec<u8>> {
    let key = format!("AWS4{}", secret).into_bytes();
    let key = hmac_sign(&key, date)?;
    let key = hmac_sign(&key, region)?;
    let key = hmac_sign(&key, service)?;
    hmac_sign(&key, b"aws4_request")
}

fn hmac_sign(key: &[u8], message: impl AsRef<[u8]>) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| anyhow!("Invalid HMAC key: {}", e))?;
    mac.update(message.as_ref());
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str) -> ObjectStorageSettings {
        ObjectStorageSettings {
            bucket: "nextgoal".into(),
            region: "ap-southeast-1".into(),
            endpoint: Some(endpoint.into()),
            access_key: "key".into(),
            secret_key: "secret".into(),
            key_prefix: "/media/".into(),
        }
    }

    #[test]
    #[serial_test::serial]
    fn https_required_in_prod() {
        std::env::set_var("APP_ENV", "prod");
        let result = ObjectStorageClient::new(settings("http://insecure.com"), Client::new());
        std::env::remove_var("APP_ENV");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("HTTPS"));
    }

    #[test]
    #[serial_test::serial]
    fn http_allowed_in_dev() {
        std::env::set_var("APP_ENV", "dev");
        let result = ObjectStorageClient::new(settings("http://localhost:9000"), Client::new());
        std::env::remove_var("APP_ENV");
        assert!(result.is_ok());
    }

    #[test]
    fn invalid_scheme_rejected() {
        assert!(ObjectStorageClient::new(settings("ftp://example.com"), Client::new()).is_err());
    }

    #[test]
    fn keys_live_under_the_prefix() {
        let client =
            ObjectStorageClient::new(settings("https://s3.example.com"), Client::new()).unwrap();
        assert_eq!(client.full_key("/images/a.png"), "media/images/a.png");
        assert_eq!(
            client.object_url("media/images/a b.png").as_str(),
            "https://s3.example.com/nextgoal/media/images/a%20b.png"
        );
    }

    #[test]
    fn parses_base64_data_urls() {
        let parsed = DataUrl::parse("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(parsed.content_type, "image/png");
        assert_eq!(parsed.bytes, b"hello");
        assert_eq!(parsed.extension(), "png");

        assert!(DataUrl::parse("image/png;base64,aGVsbG8=").is_err());
        assert!(DataUrl::parse("data:image/png,hello").is_err());
        assert!(DataUrl::parse("data:image/png;base64,***").is_err());
    }

    #[test]
    fn signing_key_is_deterministic() {
        let a = derive_signing_key("secret", "20240101", "us-east-1", "s3").unwrap();
        let b = derive_signing_key("secret", "20240101", "us-east-1", "s3").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }
}

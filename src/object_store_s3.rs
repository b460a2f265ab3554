//! S3-compatible blob backend (MinIO or AWS S3).
//!
//! Requests use path-style addressing (`{endpoint}/{bucket}/{key}`) and are
//! signed with AWS Signature Version 4 directly, without an SDK.
//! Credentials come from `MINIO_USER` and `MINIO_PASSWORD`. A bucket is
//! created on first write if it does not exist yet.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response, StatusCode};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use umesao_core::error::{Error, Result};
use umesao_core::object_store::ObjectStore;

use crate::config::{Secrets, StorageConfig};
use crate::http;

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "object store";
const TIMEOUT_SECS: u64 = 60;

pub struct S3ObjectStore {
    client: Client,
    /// Scheme plus authority, no trailing slash.
    endpoint: String,
    host: String,
    region: String,
    access_key: String,
    secret_key: String,
    known_buckets: Mutex<HashSet<String>>,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig, secrets: &Secrets) -> Result<Self> {
        let endpoint = config
            .endpoint_url
            .as_deref()
            .ok_or_else(|| {
                Error::Configuration("storage.endpoint_url is required for the s3 backend".into())
            })?
            .trim_end_matches('/')
            .to_string();
        let host = endpoint
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .to_string();
        if host.is_empty() || host.contains('/') {
            return Err(Error::Configuration(format!(
                "storage.endpoint_url must be scheme://host[:port], got '{}'",
                endpoint
            )));
        }

        Ok(Self {
            client: http::client(TIMEOUT_SECS)?,
            endpoint,
            host,
            region: config.region.clone(),
            access_key: Secrets::require(&secrets.minio_user, "MINIO_USER")?.to_string(),
            secret_key: Secrets::require(&secrets.minio_password, "MINIO_PASSWORD")?.to_string(),
            known_buckets: Mutex::new(HashSet::new()),
        })
    }

    async fn send(
        &self,
        method: Method,
        bucket: &str,
        key: Option<&str>,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<Response> {
        let path = canonical_path(bucket, key);
        let payload_hash = hex_sha256(&body);
        let signed = sign(
            &SigningInput {
                method: method.as_str(),
                path: &path,
                host: &self.host,
                region: &self.region,
                access_key: &self.access_key,
                secret_key: &self.secret_key,
                payload_hash: &payload_hash,
            },
            Utc::now(),
        )?;

        let mut request = self
            .client
            .request(method, format!("{}{}", self.endpoint, path))
            .header("Authorization", signed.authorization)
            .header("x-amz-content-sha256", payload_hash)
            .header("x-amz-date", signed.amz_date);
        if let Some(ct) = content_type {
            request = request.header("Content-Type", ct);
        }
        if !body.is_empty() {
            request = request.body(body);
        }
        request.send().await.map_err(|e| http::transport(SERVICE, e))
    }

    /// Create `bucket` unless it is known to exist.
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        if self.bucket_known(bucket)? {
            return Ok(());
        }

        let head = self.send(Method::HEAD, bucket, None, Vec::new(), None).await?;
        if head.status() == StatusCode::NOT_FOUND {
            let created = self.send(Method::PUT, bucket, None, Vec::new(), None).await?;
            http::ensure_success(SERVICE, created).await?;
            info!(bucket, "created bucket");
        } else {
            http::ensure_success(SERVICE, head).await?;
        }

        self.known_buckets
            .lock()
            .map_err(|e| Error::storage("bucket cache", e))?
            .insert(bucket.to_string());
        Ok(())
    }

    fn bucket_known(&self, bucket: &str) -> Result<bool> {
        Ok(self
            .known_buckets
            .lock()
            .map_err(|e| Error::storage("bucket cache", e))?
            .contains(bucket))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.ensure_bucket(bucket).await?;
        let size = bytes.len();
        let response = self
            .send(Method::PUT, bucket, Some(key), bytes, Some(content_type))
            .await?;
        http::ensure_success(SERVICE, response).await?;
        debug!(bucket, key, size, "uploaded object");
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let response = self
            .send(Method::GET, bucket, Some(key), Vec::new(), None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::not_found("object", format!("{}/{}", bucket, key)));
        }
        let response = http::ensure_success(SERVICE, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| http::transport(SERVICE, e))?;
        Ok(bytes.to_vec())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let response = self
            .send(Method::DELETE, bucket, Some(key), Vec::new(), None)
            .await?;
        // S3 answers 204 for missing keys too; MinIO may answer 404 for a
        // missing bucket.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        http::ensure_success(SERVICE, response).await?;
        Ok(())
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}{}", self.endpoint, canonical_path(bucket, Some(key)))
    }
}

// ============ AWS SigV4 ============

struct SigningInput<'a> {
    method: &'a str,
    path: &'a str,
    host: &'a str,
    region: &'a str,
    access_key: &'a str,
    secret_key: &'a str,
    payload_hash: &'a str,
}

struct SignedHeaders {
    authorization: String,
    amz_date: String,
}

fn canonical_path(bucket: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => format!(
            "/{}/{}",
            uri_encode(bucket),
            key.split('/').map(uri_encode).collect::<Vec<_>>().join("/")
        ),
        None => format!("/{}", uri_encode(bucket)),
    }
}

fn sign(input: &SigningInput<'_>, now: DateTime<Utc>) -> Result<SignedHeaders> {
    let date_stamp = now.format("%Y%m%d").to_string();
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

    let signed_headers = "host;x-amz-content-sha256;x-amz-date";
    let canonical_headers = format!(
        "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
        input.host, input.payload_hash, amz_date
    );
    let canonical_request = format!(
        "{}\n{}\n\n{}\n{}\n{}",
        input.method, input.path, canonical_headers, signed_headers, input.payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, input.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(input.secret_key, &date_stamp, input.region, "s3")?;
    let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

    Ok(SignedHeaders {
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            input.access_key, credential_scope, signed_headers, signature
        ),
        amz_date,
    })
}

fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| Error::Configuration(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

/// RFC 3986 encoding; only `A-Z a-z 0-9 - _ . ~` pass through.
fn uri_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}

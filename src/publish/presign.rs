//! Presigned POST authorization for S3 uploads
//!
//! Builds the browser-style POST policy of AWS Signature Version 4: a
//! base64 policy document limited to one bucket and key, signed with a
//! key derived from the secret, date, region and service.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::collections::BTreeMap;

use crate::config::ObjectStoreSettings;
use crate::error::{PublishError, PublishResult};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";

/// Target URL and form fields for one upload
#[derive(Debug, Clone, PartialEq)]
pub struct PresignedPost {
    pub url: String,
    /// Sent as form fields ahead of the file part
    pub fields: BTreeMap<String, String>,
}

/// Grants short-lived permission to upload one object
pub trait UploadAuthorizer {
    fn authorize(&self, key: &str) -> PublishResult<PresignedPost>;
}

/// Signs POST policies with long-lived S3 credentials
#[derive(Debug, Clone)]
pub struct S3PostSigner {
    bucket: String,
    region: String,
    access_key_id: String,
    secret_access_key: String,
    expiry_secs: u64,
}

impl S3PostSigner {
    pub fn new(settings: &ObjectStoreSettings) -> Self {
        S3PostSigner {
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
            access_key_id: settings.access_key_id.clone(),
            secret_access_key: settings.secret_access_key.clone(),
            expiry_secs: settings.presign_expiry_secs,
        }
    }

    /// Virtual-hosted bucket endpoint
    pub fn endpoint(&self) -> String {
        format!("https://{}.s3.{}.amazonaws.com/", self.bucket, self.region)
    }

    /// Signs a policy issued at `now`
    pub fn presign_post_at(&self, key: &str, now: DateTime<Utc>) -> PublishResult<PresignedPost> {
        if self.bucket.is_empty() || self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return Err(PublishError::Authorization(
                "bucket name and credentials must be configured".to_string(),
            ));
        }

        let date = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let credential = format!("{}/{}/{}/{}/aws4_request", self.access_key_id, date, self.region, SERVICE);
        let expiration = now + Duration::seconds(self.expiry_secs as i64);

        let policy = json!({
            "expiration": expiration.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            "conditions": [
                {"bucket": self.bucket},
                {"key": key},
                {"x-amz-algorithm": ALGORITHM},
                {"x-amz-credential": credential},
                {"x-amz-date": amz_date},
            ],
        });
        let encoded_policy = STANDARD.encode(policy.to_string());

        let signing_key = derive_signing_key(&self.secret_access_key, &date, &self.region, SERVICE)?;
        let signature = to_hex(&hmac_sha256(&signing_key, encoded_policy.as_bytes())?);

        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), key.to_string());
        fields.insert("x-amz-algorithm".to_string(), ALGORITHM.to_string());
        fields.insert("x-amz-credential".to_string(), credential);
        fields.insert("x-amz-date".to_string(), amz_date);
        fields.insert("policy".to_string(), encoded_policy);
        fields.insert("x-amz-signature".to_string(), signature);

        Ok(PresignedPost {
            url: self.endpoint(),
            fields,
        })
    }
}

impl UploadAuthorizer for S3PostSigner {
    fn authorize(&self, key: &str) -> PublishResult<PresignedPost> {
        self.presign_post_at(key, Utc::now())
    }
}

/// SigV4 signing key: HMAC chain over date, region, service
pub fn derive_signing_key(secret: &str, date: &str, region: &str, service: &str) -> PublishResult<Vec<u8>> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), date.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> PublishResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| PublishError::Authorization(e.to_string()))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    fn signer() -> S3PostSigner {
        S3PostSigner::new(&ObjectStoreSettings {
            bucket: "rasters".to_string(),
            region: "eu-central-1".to_string(),
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: SECRET.to_string(),
            ..ObjectStoreSettings::default()
        })
    }

    #[test]
    fn test_signing_key_matches_reference_vector() {
        let key = derive_signing_key(SECRET, "20120215", "us-east-1", "iam").unwrap();
        assert_eq!(to_hex(&key), "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d");
    }

    #[test]
    fn test_presigned_fields() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let post = signer().presign_post_at("cog/dem.tif", now).unwrap();

        assert_eq!(post.url, "https://rasters.s3.eu-central-1.amazonaws.com/");
        assert_eq!(post.fields["key"], "cog/dem.tif");
        assert_eq!(post.fields["x-amz-algorithm"], "AWS4-HMAC-SHA256");
        assert_eq!(post.fields["x-amz-credential"], "AKIDEXAMPLE/20261019/eu-central-1/s3/aws4_request");
        assert_eq!(post.fields["x-amz-date"], "20261019T120000Z");
        assert_eq!(post.fields["x-amz-signature"], SIGNATURE);

        let policy: serde_json::Value =
            serde_json::from_slice(&STANDARD.decode(&post.fields["policy"]).unwrap()).unwrap();
        assert_eq!(policy["expiration"], "2026-10-19T13:00:00.000Z");
        assert_eq!(policy["conditions"][1]["key"], "cog/dem.tif");
    }

    #[test]
    fn test_missing_credentials() {
        let signer = S3PostSigner::new(&ObjectStoreSettings::default());
        assert!(matches!(signer.authorize("cog/a.tif"), Err(PublishError::Authorization(_))));
    }

    const SIGNATURE: &str = "a837352e8855ab7c2bf030f9bdf339b7084622fed5720ec9b7176deb4986546f";
}

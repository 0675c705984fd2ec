//! Object-store uploads through presigned POST

use log::{error, info};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use std::path::Path;

use crate::config::ObjectStoreSettings;
use crate::error::{PublishError, PublishResult};
use crate::publish::presign::UploadAuthorizer;

/// Stores a local file under a key in object storage
pub trait ObjectUploader {
    /// # Returns
    /// Public URL of the stored object
    fn upload(&self, key: &str, path: &Path) -> PublishResult<String>;
}

/// Uploads with a freshly authorized presigned POST per object
pub struct PresignedPostUploader<A: UploadAuthorizer> {
    authorizer: A,
    http: Client,
    bucket: String,
    region: String,
}

impl<A: UploadAuthorizer> PresignedPostUploader<A> {
    pub fn new(authorizer: A, settings: &ObjectStoreSettings) -> PublishResult<Self> {
        Ok(PresignedPostUploader {
            authorizer,
            http: Client::builder().build()?,
            bucket: settings.bucket.clone(),
            region: settings.region.clone(),
        })
    }

    pub fn public_url(&self, key: &str) -> String {
        public_object_url(&self.bucket, &self.region, key)
    }
}

impl<A: UploadAuthorizer> ObjectUploader for PresignedPostUploader<A> {
    fn upload(&self, key: &str, path: &Path) -> PublishResult<String> {
        let post = self.authorizer.authorize(key)?;
        info!("Uploading {} to {} as {}", path.display(), post.url, key);

        // Policy fields must precede the file part
        let form = post
            .fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value));
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.to_string());
        let form = form.part("file", Part::file(path)?.file_name(filename));

        let response = self.http.post(&post.url).multipart(form).send()?;
        let status = response.status();
        if !status.is_success() {
            error!("Upload of {} failed with status {}", key, status.as_u16());
            return Err(PublishError::UploadFailed {
                status: status.as_u16(),
            });
        }

        let url = self.public_url(key);
        info!("Stored {}", url);
        Ok(url)
    }
}

/// `https://{bucket}.s3.{region}.amazonaws.com/{key}`
pub fn public_object_url(bucket: &str, region: &str, key: &str) -> String {
    format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::presign::PresignedPost;
    use std::collections::BTreeMap;

    struct FixedAuthorizer(String);

    impl UploadAuthorizer for FixedAuthorizer {
        fn authorize(&self, key: &str) -> PublishResult<PresignedPost> {
            let mut fields = BTreeMap::new();
            fields.insert("key".to_string(), key.to_string());
            Ok(PresignedPost {
                url: self.0.clone(),
                fields,
            })
        }
    }

    struct DenyingAuthorizer;

    impl UploadAuthorizer for DenyingAuthorizer {
        fn authorize(&self, _key: &str) -> PublishResult<PresignedPost> {
            Err(PublishError::Authorization("no credentials".to_string()))
        }
    }

    fn settings() -> ObjectStoreSettings {
        ObjectStoreSettings {
            bucket: "rasters".to_string(),
            region: "eu-central-1".to_string(),
            ..ObjectStoreSettings::default()
        }
    }

    #[test]
    fn test_public_url() {
        let uploader = PresignedPostUploader::new(DenyingAuthorizer, &settings()).unwrap();
        assert_eq!(
            uploader.public_url("cog/dem.tif"),
            "https://rasters.s3.eu-central-1.amazonaws.com/cog/dem.tif"
        );
    }

    #[test]
    fn test_authorization_failure_stops_upload() {
        let uploader = PresignedPostUploader::new(DenyingAuthorizer, &settings()).unwrap();
        assert!(matches!(
            uploader.upload("cog/a.tif", Path::new("/nonexistent/a.tif")),
            Err(PublishError::Authorization(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let uploader =
            PresignedPostUploader::new(FixedAuthorizer("http://127.0.0.1:9/".to_string()), &settings()).unwrap();
        assert!(matches!(
            uploader.upload("cog/a.tif", Path::new("/nonexistent/a.tif")),
            Err(PublishError::Io(_))
        ));
    }
}

use crate::config::StorageSettings;
use crate::models::ImagePayload;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid image payload: {0}")]
    InvalidPayload(String),
    #[error("upload failed: {0}")]
    Upload(String),
}

/// Pushes raw product photos to the S3 bucket and hands back public URLs.
/// Objects are made world-readable on purpose: the marketplace fetches the
/// images by URL with no further auth.
#[derive(Clone)]
pub struct ImageStore {
    client: Client,
    bucket: String,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub urls: Vec<String>,
    pub skipped: usize,
}

impl ImageStore {
    pub async fn from_settings(settings: &StorageSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key_id.clone(),
            settings.secret_access_key.clone(),
            None,
            None,
            "snaplist-env",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        Self {
            client: Client::new(&shared),
            bucket: settings.bucket.clone(),
        }
    }

    /// Upload a batch of images. Keys combine one timestamp per batch with
    /// the image's position, so a session never collides with itself. A
    /// failed item is logged and skipped; the rest of the batch continues.
    pub async fn upload_images(&self, images: &[ImagePayload]) -> UploadOutcome {
        let batch = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let mut urls = Vec::with_capacity(images.len());
        let mut skipped = 0;

        for (index, image) in images.iter().enumerate() {
            match self.upload_one(&batch, index, image).await {
                Ok(url) => urls.push(url),
                Err(err) => {
                    skipped += 1;
                    warn!(
                        target = "snaplist.storage",
                        index = index,
                        error = %err,
                        "image_upload_skipped"
                    );
                }
            }
        }

        info!(
            target = "snaplist.storage",
            uploaded = urls.len(),
            skipped = skipped,
            "image_batch_uploaded"
        );
        UploadOutcome { urls, skipped }
    }

    async fn upload_one(
        &self,
        batch: &str,
        index: usize,
        image: &ImagePayload,
    ) -> Result<String, StorageError> {
        let bytes = BASE64
            .decode(image.data.trim())
            .map_err(|err| StorageError::InvalidPayload(err.to_string()))?;
        let key = object_key(batch, index, &image.content_type);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&image.content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|err| StorageError::Upload(err.to_string()))?;

        Ok(public_url(&self.bucket, &key))
    }
}

fn object_key(batch: &str, index: usize, content_type: &str) -> String {
    format!(
        "product_images/{batch}_{index}.{}",
        extension_for(content_type)
    )
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "jpg",
    }
}

fn public_url(bucket: &str, key: &str) -> String {
    format!("https://{bucket}.s3.amazonaws.com/{key}")
}

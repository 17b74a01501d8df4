//! Reqwest-backed Cloudinary image store.
//!
//! Uploads are signed with the account's API secret using SHA-256, so the Cloudinary account
//! must have SHA-256 signatures enabled. The public id of an upload is the stem of the name
//! it was saved under, which keeps [`public_id_from_reference`] the inverse of the delivery
//! URL returned by Cloudinary.

use std::time::Duration;

use chrono::Utc;
use reqwest::{
    multipart::{Form, Part},
    Client, Response,
};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::ports::image_store::{Error, ImageStorePort};

pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudinary.com/v1_1";
const DELIVERY_BASE_URL: &str = "https://res.cloudinary.com";

/// Account credentials for the Cloudinary upload API
#[derive(Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

pub struct CloudinaryImageStore {
    client: Client,
    api_base_url: String,
    credentials: CloudinaryCredentials,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

impl CloudinaryImageStore {
    /// Build a store using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        credentials: CloudinaryCredentials,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            credentials,
        })
    }

    /// Send API calls to another base URL, e.g. a proxy in front of Cloudinary
    pub fn with_api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{action}",
            self.api_base_url, self.credentials.cloud_name
        )
    }

    /// Prefix shared by every delivery URL of this cloud
    fn delivery_prefix(&self) -> String {
        format!(
            "{DELIVERY_BASE_URL}/{}/image/upload/",
            self.credentials.cloud_name
        )
    }

    fn sign(&self, params: &[(&str, &str)]) -> String {
        sign_params(params, &self.credentials.api_secret)
    }
}

#[async_trait::async_trait]
impl ImageStorePort for CloudinaryImageStore {
    /// Cloudinary has no cheap existence query, so a reference is considered stored when it
    /// is a delivery URL of this cloud.
    async fn exists(&self, reference: &str) -> Result<bool, Error> {
        Ok(reference.starts_with(&self.delivery_prefix())
            && !public_id_from_reference(reference).is_empty())
    }

    async fn save(&self, name: &str, content: &[u8]) -> Result<String, Error> {
        let public_id = public_id_from_reference(name);
        if public_id.is_empty() {
            return Err(Error::InvalidName(name.to_string()));
        }
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", &timestamp)]);

        let form = Form::new()
            .part(
                "file",
                Part::bytes(content.to_vec()).file_name(name.to_string()),
            )
            .text("api_key", self.credentials.api_key.clone())
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        let upload: UploadResponse = parse_response(response).await?;
        debug!(public_id, url = %upload.secure_url, "uploaded image");

        Ok(upload.secure_url)
    }

    async fn delete(&self, reference: &str) -> Result<(), Error> {
        let public_id = public_id_from_reference(reference);
        if public_id.is_empty() {
            return Err(Error::InvalidName(reference.to_string()));
        }
        let timestamp = Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", &timestamp)]);

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&[
                ("api_key", self.credentials.api_key.as_str()),
                ("public_id", public_id),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await?;
        let destroyed: DestroyResponse = parse_response(response).await?;

        match destroyed.result.as_str() {
            "ok" => {
                debug!(public_id, "destroyed image");
                Ok(())
            }
            "not found" => Err(Error::Rejected {
                status: 404,
                message: format!("image {public_id} not found"),
            }),
            other => Err(Error::Rejected {
                status: 200,
                message: other.to_string(),
            }),
        }
    }
}

async fn parse_response<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, Error> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorResponse>(&body)
            .map(|err| err.error.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        return Err(Error::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(&body).map_err(|err| Error::Adapter(Box::new(err)))
}

/// Cloudinary public id behind a name or delivery URL
///
/// This is the last path segment without its extension.
pub fn public_id_from_reference(reference: &str) -> &str {
    let file_name = reference.rsplit('/').next().unwrap_or(reference);
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => &file_name[..dot],
        _ => file_name,
    }
}

/// Signature over the request parameters, sorted by name, followed by the API secret
fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by_key(|(name, _)| *name);
    let to_sign = sorted
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(to_sign.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Adapter(Box::new(err))
    }
}

use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config_store::ConfigStore;
use crate::error::HostError;

/// What the service reports for a stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    pub filename: String,
    pub url: String,
    pub delete: String,
}

/// Remote side of the tool. A returned error always means the operation
/// did not take effect and must not be mirrored into the local history.
pub trait ImageHost {
    fn upload(&self, image: &Path) -> Result<RemoteImage, HostError>;
    fn delete(&self, delete_url: &str) -> Result<(), HostError>;
    fn clear(&self) -> Result<(), HostError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    filename: String,
    url: String,
    delete: String,
    #[serde(default)]
    timestamp: Option<i64>,
}

impl UploadResponse {
    fn into_remote_image(self) -> Result<RemoteImage, HostError> {
        if self.code != "success" {
            let message = self
                .msg
                .or(self.message)
                .unwrap_or_else(|| format!("service answered `{}`", self.code));
            return Err(HostError::Rejected { message });
        }

        let data = self
            .data
            .ok_or_else(|| HostError::MalformedResponse("success without data".to_string()))?;
        debug!(filename = %data.filename, timestamp = ?data.timestamp, "upload accepted");
        Ok(RemoteImage {
            filename: data.filename,
            url: data.url,
            delete: data.delete,
        })
    }
}

fn parse_upload_response(body: &str) -> Result<RemoteImage, HostError> {
    let response: UploadResponse = serde_json::from_str(body)
        .map_err(|err| HostError::MalformedResponse(err.to_string()))?;
    response.into_remote_image()
}

/// Blocking client for the sm.ms v1 API.
#[derive(Clone)]
pub struct SmmsClient {
    client: Client,
    upload_url: String,
    clear_url: String,
}

impl SmmsClient {
    pub fn new(upload_url: String, clear_url: String, timeout: Duration) -> Result<Self, HostError> {
        let client = Client::builder()
            .user_agent(concat!("smms/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            upload_url,
            clear_url,
        })
    }

    pub fn from_config(config: &ConfigStore) -> Result<Self, HostError> {
        Self::new(
            config.upload_url(),
            config.clear_url(),
            Duration::from_secs(config.timeout_sec()),
        )
    }
}

impl ImageHost for SmmsClient {
    fn upload(&self, image: &Path) -> Result<RemoteImage, HostError> {
        let form = multipart::Form::new()
            .file("smfile", image)
            .map_err(|source| HostError::Io {
                path: image.to_path_buf(),
                source,
            })?;

        debug!(image = %image.display(), url = %self.upload_url, "uploading");
        let res = self
            .client
            .post(&self.upload_url)
            .query(&[("format", "json"), ("ssl", "true")])
            .multipart(form)
            .send()?;
        let status = res.status();
        let body = res.text()?;
        debug!(%status, "upload response received");

        match parse_upload_response(&body) {
            Err(HostError::MalformedResponse(_)) if !status.is_success() => {
                Err(HostError::Status(status))
            }
            other => other,
        }
    }

    fn delete(&self, delete_url: &str) -> Result<(), HostError> {
        debug!(url = %delete_url, "deleting");
        let res = self.client.get(delete_url).send()?;
        let status = res.status();
        if !status.is_success() {
            warn!(url = %delete_url, %status, "delete rejected");
            return Err(HostError::Status(status));
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), HostError> {
        debug!(url = %self.clear_url, "clearing remote history");
        let res = self.client.get(&self.clear_url).send()?;
        let status = res.status();
        if !status.is_success() {
            return Err(HostError::Status(status));
        }
        Ok(())
    }
}

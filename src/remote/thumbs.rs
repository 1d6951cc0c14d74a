use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client};

/// Receives generated thumbnails.
pub trait ThumbnailSink {
    /// Deliver one thumbnail; returns the HTTP status of the response.
    fn post(&self, filename: &str, bytes: Vec<u8>) -> Result<u16>;
}

/// Posts thumbnails as multipart forms (`thumb_file` + `filename`).
pub struct HttpThumbnailSink {
    client: Client,
    url: String,
}

impl HttpThumbnailSink {
    pub fn new(url: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl ThumbnailSink for HttpThumbnailSink {
    fn post(&self, filename: &str, bytes: Vec<u8>) -> Result<u16> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new()
            .text("filename", filename.to_string())
            .part("thumb_file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .with_context(|| format!("Failed to post thumbnail for {}", filename))?;
        Ok(response.status().as_u16())
    }
}

// Photo upload endpoints
//
// Uploading a room photo is a three-step dance: ask the backend for a
// one-time direct-upload URL, POST the file there as multipart, then attach
// the resulting public image URL to the room.

use reqwest::multipart::{Form, Part};
use tracing::debug;
use url::Url;

use crate::client::{ApiClient, parse_json};
use crate::error::Error;
use crate::models::{CreatePhotoRequest, Photo, RoomPk, UploadUrl, UploadedImage};

impl ApiClient {
    /// Request a one-time upload URL.
    ///
    /// `POST media/photos/get-url` (CSRF)
    pub async fn get_upload_url(&self) -> Result<UploadUrl, Error> {
        let url = self.api_url("media/photos/get-url")?;
        self.post(url, &serde_json::json!({})).await
    }

    /// Upload raw image bytes to a URL obtained from
    /// [`get_upload_url`](Self::get_upload_url).
    ///
    /// The upload URL belongs to the image host, not the marketplace, so no
    /// CSRF header is attached.
    pub async fn upload_image(
        &self,
        upload_url: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedImage, Error> {
        let url = Url::parse(upload_url)?;
        debug!(%url, size = bytes.len(), "uploading image");
        let part = Part::bytes(bytes).file_name(file_name.to_owned());
        let form = Form::new().part("file", part);
        let resp = self.http().post(url).multipart(form).send().await?;
        parse_json(resp).await
    }

    /// Attach an uploaded image to a room.
    ///
    /// `POST room/{pk}/photo` (CSRF)
    pub async fn create_photo(
        &self,
        pk: RoomPk,
        description: &str,
        file: &str,
    ) -> Result<Photo, Error> {
        let url = self.api_url(&format!("room/{pk}/photo"))?;
        self.post(url, &CreatePhotoRequest { description, file }).await
    }
}

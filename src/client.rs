use std::path::Path;

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::credential::DEFAULT_BASE_URL;
use crate::types::{ApiResponse, AuthKey, Body, Filter, Pet, PetList};

const AUTH_HEADER: &str = "auth_key";

/// Thin typed wrapper over the PetFriends REST API.
///
/// Every call is a single request: no retries, no timeouts. Service-level
/// failures come back as an [`ApiResponse`] carrying the status code; only
/// transport and local I/O failures are `Err`.
#[derive(Debug, Clone)]
pub struct PetFriendsClient {
    http_client: Client,
    base_url: String,
}

impl PetFriendsClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            http_client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request an API key for the given account
    pub async fn get_api_key(&self, email: &str, password: &str) -> Result<ApiResponse<AuthKey>> {
        let request = self
            .http_client
            .get(self.url("api/key"))
            .header("email", email)
            .header("password", password);

        send(request, "get_api_key").await
    }

    /// List pets; `filter` selects all pets or only the account's own
    pub async fn get_list_of_pets(
        &self,
        auth_key: &AuthKey,
        filter: &Filter,
    ) -> Result<ApiResponse<PetList>> {
        tracing::debug!("Listing pets with filter {}", filter);
        let request = self
            .http_client
            .get(self.url("api/pets"))
            .header(AUTH_HEADER, &auth_key.key)
            .query(&[("filter", filter.as_str())]);

        send(request, "get_list_of_pets").await
    }

    /// Create a pet with a photo attached
    pub async fn add_new_pet(
        &self,
        auth_key: &AuthKey,
        name: &str,
        animal_type: &str,
        age: &str,
        photo_path: &Path,
    ) -> Result<ApiResponse<Pet>> {
        let form = Form::new()
            .text("name", name.to_string())
            .text("animal_type", animal_type.to_string())
            .text("age", age.to_string())
            .part("pet_photo", photo_part(photo_path).await?);

        let request = self
            .http_client
            .post(self.url("api/pets"))
            .header(AUTH_HEADER, &auth_key.key)
            .multipart(form);

        send(request, "add_new_pet").await
    }

    /// Create a pet without a photo
    pub async fn add_new_pet_simple(
        &self,
        auth_key: &AuthKey,
        name: &str,
        animal_type: &str,
        age: &str,
    ) -> Result<ApiResponse<Pet>> {
        let request = self
            .http_client
            .post(self.url("api/create_pet_simple"))
            .header(AUTH_HEADER, &auth_key.key)
            .form(&[("name", name), ("animal_type", animal_type), ("age", age)]);

        send(request, "add_new_pet_simple").await
    }

    /// Attach or replace the photo of an existing pet
    pub async fn add_pet_photo(
        &self,
        auth_key: &AuthKey,
        pet_id: &str,
        photo_path: &Path,
    ) -> Result<ApiResponse<Pet>> {
        let form = Form::new().part("pet_photo", photo_part(photo_path).await?);

        let request = self
            .http_client
            .post(self.url(&format!("api/pets/set_photo/{}", pet_id)))
            .header(AUTH_HEADER, &auth_key.key)
            .multipart(form);

        send(request, "add_pet_photo").await
    }

    pub async fn update_pet_info(
        &self,
        auth_key: &AuthKey,
        pet_id: &str,
        name: &str,
        animal_type: &str,
        age: &str,
    ) -> Result<ApiResponse<Pet>> {
        let request = self
            .http_client
            .put(self.url(&format!("api/pets/{}", pet_id)))
            .header(AUTH_HEADER, &auth_key.key)
            .form(&[("name", name), ("animal_type", animal_type), ("age", age)]);

        send(request, "update_pet_info").await
    }

    /// Delete a pet. The service answers with an empty body, so the body is
    /// always raw text.
    pub async fn delete_pet(&self, auth_key: &AuthKey, pet_id: &str) -> Result<ApiResponse<()>> {
        let request = self
            .http_client
            .delete(self.url(&format!("api/pets/{}", pet_id)))
            .header(AUTH_HEADER, &auth_key.key);

        let response = request
            .send()
            .await
            .context("delete_pet: request failed")?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(%status, "delete_pet");

        Ok(ApiResponse {
            status,
            body: Body::Raw(text),
        })
    }
}

impl Default for PetFriendsClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Send a request and split the response into status and body
async fn send<T: DeserializeOwned>(request: RequestBuilder, op: &str) -> Result<ApiResponse<T>> {
    let response = request
        .send()
        .await
        .with_context(|| format!("{}: request failed", op))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .with_context(|| format!("{}: failed to read response body", op))?;

    tracing::debug!(%status, bytes = text.len(), "{}", op);

    let body = match serde_json::from_str::<T>(&text) {
        Ok(value) => Body::Parsed(value),
        Err(_) => Body::Raw(text),
    };

    Ok(ApiResponse { status, body })
}

async fn photo_part(path: &Path) -> Result<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read photo {}", path.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "photo".to_string());

    Ok(Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_for(path))?)
}

/// MIME type for a photo, by file extension
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

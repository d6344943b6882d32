//! In-memory stand-in for the PetFriends service.
//!
//! Reproduces the status codes, JSON shapes and HTML error pages the remote
//! service answers with, so scenarios can run isolated from the shared
//! account. Each `MockService` owns its own store.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use axum::{
    Form, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post, put},
};
use base64::Engine;
use serde::Deserialize;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::credential::Credentials;
use crate::types::{AuthKey, INCORRECT_FILTER_MESSAGE, Pet, PetList, USER_NOT_FOUND_MESSAGE};

const MISSING_KEY_MESSAGE: &str = "Please provide &#x27;auth_key&#x27; Header";

/// Account registered on the mock service
#[derive(Debug, Clone)]
pub struct MockAccount {
    pub credentials: Credentials,
    pub key: String,
    pub user_id: String,
}

impl MockAccount {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            key: random_hex(),
            user_id: random_hex(),
        }
    }
}

#[derive(Clone)]
pub struct MockService {
    inner: Arc<RwLock<MockStore>>,
}

struct MockStore {
    account: MockAccount,
    pets: Vec<Pet>,
    /// File newly created pets under a stranger, so they never show up in
    /// the account's `my_pets` listing
    orphan_new_pets: bool,
}

impl MockService {
    /// Create a service with one account and a single pet owned by somebody
    /// else, so the unfiltered listing is never empty.
    pub fn new(credentials: Credentials) -> Self {
        let stranger = Pet {
            id: random_hex(),
            name: "Шарик".to_string(),
            animal_type: "пёс".to_string(),
            age: "3".to_string(),
            pet_photo: String::new(),
            created_at: Some(now_timestamp()),
            user_id: Some(random_hex()),
        };

        Self {
            inner: Arc::new(RwLock::new(MockStore {
                account: MockAccount::new(credentials),
                pets: vec![stranger],
                orphan_new_pets: false,
            })),
        }
    }

    pub async fn account(&self) -> MockAccount {
        self.inner.read().await.account.clone()
    }

    pub async fn set_orphan_new_pets(&self, orphan: bool) {
        self.inner.write().await.orphan_new_pets = orphan;
    }

    /// Snapshot of every stored pet
    pub async fn pets(&self) -> Vec<Pet> {
        self.inner.read().await.pets.clone()
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/key", get(get_api_key))
            .route("/api/pets", get(list_pets).post(create_pet))
            .route("/api/create_pet_simple", post(create_pet_simple))
            .route("/api/pets/set_photo/:pet_id", post(set_photo))
            .route("/api/pets/:pet_id", put(update_pet).delete(delete_pet))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            .with_state(self.clone())
    }

    /// Serve on an ephemeral loopback port in a background task.
    /// Returns the base URL.
    pub async fn spawn(&self) -> Result<String> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind mock service")?;
        let addr = listener.local_addr()?;
        let app = self.router();

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Mock service error: {}", e);
            }
        });

        tracing::debug!("Mock service listening on {}", addr);
        Ok(format!("http://{}/", addr))
    }
}

#[derive(Debug, Default, Deserialize)]
struct PetForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    animal_type: String,
    #[serde(default)]
    age: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    #[serde(default)]
    filter: String,
}

async fn get_api_key(State(service): State<MockService>, headers: HeaderMap) -> Response {
    let store = service.inner.read().await;
    let email = header(&headers, "email");
    let password = header(&headers, "password");

    if email == Some(store.account.credentials.email.as_str())
        && password == Some(store.account.credentials.password.as_str())
    {
        Json(AuthKey::new(store.account.key.clone())).into_response()
    } else {
        tracing::info!("Rejected key request for {:?}", email);
        error_page(StatusCode::FORBIDDEN, USER_NOT_FOUND_MESSAGE)
    }
}

async fn list_pets(
    State(service): State<MockService>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Response {
    let store = service.inner.read().await;
    let user_id = match store.authorize(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let pets = match query.filter.as_str() {
        "" => store.pets.clone(),
        "my_pets" => store.owned_by(&user_id).cloned().collect(),
        other => {
            tracing::info!("Rejected filter {:?}", other);
            return error_page(StatusCode::INTERNAL_SERVER_ERROR, INCORRECT_FILTER_MESSAGE);
        }
    };

    Json(PetList { pets }).into_response()
}

async fn create_pet(
    State(service): State<MockService>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let (form, photo) = match read_multipart(multipart).await {
        Ok(parts) => parts,
        Err(response) => return response,
    };

    let mut store = service.inner.write().await;
    let user_id = match store.authorize(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let Some(photo) = photo else {
        return error_page(StatusCode::BAD_REQUEST, "pet_photo is required");
    };

    let pet = store.insert(user_id, form, photo);
    Json(pet).into_response()
}

async fn create_pet_simple(
    State(service): State<MockService>,
    headers: HeaderMap,
    Form(form): Form<PetForm>,
) -> Response {
    let mut store = service.inner.write().await;
    let user_id = match store.authorize(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    let pet = store.insert(user_id, form, String::new());
    Json(pet).into_response()
}

async fn set_photo(
    State(service): State<MockService>,
    Path(pet_id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let photo = match read_multipart(multipart).await {
        Ok((_, photo)) => photo,
        Err(response) => return response,
    };

    let mut store = service.inner.write().await;
    let user_id = match store.authorize(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };
    let Some(photo) = photo else {
        return error_page(StatusCode::BAD_REQUEST, "pet_photo is required");
    };

    match store.find_owned(&user_id, &pet_id) {
        Some(pet) => {
            pet.pet_photo = photo;
            Json(pet.clone()).into_response()
        }
        None => error_page(StatusCode::BAD_REQUEST, "Pet with this id wasn&#x27;t found"),
    }
}

async fn update_pet(
    State(service): State<MockService>,
    Path(pet_id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<PetForm>,
) -> Response {
    let mut store = service.inner.write().await;
    let user_id = match store.authorize(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    match store.find_owned(&user_id, &pet_id) {
        Some(pet) => {
            pet.name = form.name;
            pet.animal_type = form.animal_type;
            pet.age = form.age;
            Json(pet.clone()).into_response()
        }
        None => error_page(StatusCode::BAD_REQUEST, "Pet with this id wasn&#x27;t found"),
    }
}

/// Deleting an unknown id is a no-op, like on the real service
async fn delete_pet(
    State(service): State<MockService>,
    Path(pet_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut store = service.inner.write().await;
    let user_id = match store.authorize(&headers) {
        Ok(user_id) => user_id,
        Err(response) => return response,
    };

    store
        .pets
        .retain(|pet| !(pet.id == pet_id && pet.user_id.as_deref() == Some(user_id.as_str())));

    StatusCode::OK.into_response()
}

impl MockStore {
    /// Resolve the `auth_key` header to the owning user id
    fn authorize(&self, headers: &HeaderMap) -> Result<String, Response> {
        match header(headers, "auth_key") {
            Some(key) if key == self.account.key => Ok(self.account.user_id.clone()),
            _ => Err(error_page(StatusCode::FORBIDDEN, MISSING_KEY_MESSAGE)),
        }
    }

    fn owned_by<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a Pet> + 'a {
        self.pets
            .iter()
            .filter(move |pet| pet.user_id.as_deref() == Some(user_id))
    }

    fn find_owned(&mut self, user_id: &str, pet_id: &str) -> Option<&mut Pet> {
        self.pets
            .iter_mut()
            .find(|pet| pet.id == pet_id && pet.user_id.as_deref() == Some(user_id))
    }

    fn insert(&mut self, user_id: String, form: PetForm, pet_photo: String) -> Pet {
        let user_id = if self.orphan_new_pets {
            random_hex()
        } else {
            user_id
        };
        let pet = Pet {
            id: random_hex(),
            name: form.name,
            animal_type: form.animal_type,
            age: form.age,
            pet_photo,
            created_at: Some(now_timestamp()),
            user_id: Some(user_id),
        };
        // Newest first, as the service lists them
        self.pets.insert(0, pet.clone());
        pet
    }
}

/// Split a multipart body into the text fields and an optional photo,
/// encoded as a data URI
async fn read_multipart(mut multipart: Multipart) -> Result<(PetForm, Option<String>), Response> {
    let mut form = PetForm::default();
    let mut photo = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(error_page(StatusCode::BAD_REQUEST, &e.to_string())),
        };

        let name = field.name().unwrap_or_default().to_string();
        if name == "pet_photo" {
            let mime = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| error_page(StatusCode::BAD_REQUEST, &e.to_string()))?;
            let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
            photo = Some(format!("data:{};base64,{}", mime, encoded));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| error_page(StatusCode::BAD_REQUEST, &e.to_string()))?;
        match name.as_str() {
            "name" => form.name = value,
            "animal_type" => form.animal_type = value,
            "age" => form.age = value,
            _ => {}
        }
    }

    Ok((form, photo))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// HTML error page in the format the service's framework renders
fn error_page(status: StatusCode, message: &str) -> Response {
    let reason = status.canonical_reason().unwrap_or("Error");
    let body = format!(
        "<!doctype html>\n<html lang=en>\n<title>{code} {reason}</title>\n<h1>{reason}</h1>\n<p>{message}</p>\n",
        code = status.as_u16(),
    );
    (status, Html(body)).into_response()
}

fn random_hex() -> String {
    format!("{:032x}", fastrand::u128(..))
}

fn now_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    format!("{:.4}", secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::PetFriendsClient;
    use crate::types::Filter;

    async fn setup() -> (MockService, PetFriendsClient, AuthKey) {
        let service = MockService::new(Credentials::new("owner@example.com", "pw"));
        let base_url = service.spawn().await.unwrap();
        let client = PetFriendsClient::with_base_url(base_url);
        let key = client
            .get_api_key("owner@example.com", "pw")
            .await
            .unwrap()
            .into_parsed()
            .unwrap();
        (service, client, key)
    }

    #[tokio::test]
    async fn test_issues_configured_key() {
        let (service, _client, key) = setup().await;
        assert_eq!(key.key, service.account().await.key);
    }

    #[tokio::test]
    async fn test_unfiltered_listing_includes_strangers() {
        let (_service, client, key) = setup().await;

        let all = client.get_list_of_pets(&key, &Filter::All).await.unwrap();
        assert_eq!(all.status, StatusCode::OK);
        assert_eq!(all.parsed().unwrap().pets.len(), 1);

        let mine = client.get_list_of_pets(&key, &Filter::MyPets).await.unwrap();
        assert!(mine.parsed().unwrap().pets.is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_is_forbidden() {
        let (_service, client, _key) = setup().await;
        let response = client
            .get_list_of_pets(&AuthKey::new(""), &Filter::All)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert!(response.text_contains("auth_key"));
    }

    #[tokio::test]
    async fn test_update_unknown_pet_is_bad_request() {
        let (_service, client, key) = setup().await;
        let response = client
            .update_pet_info(&key, "nope", "a", "b", "1")
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cannot_delete_strangers_pet() {
        let (service, client, key) = setup().await;
        let stranger_id = service.pets().await[0].id.clone();

        let response = client.delete_pet(&key, &stranger_id).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(service.pets().await.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_upload_does_not_block_other_requests() {
        use std::time::Duration;
        use tokio::io::AsyncWriteExt;

        let service = MockService::new(Credentials::new("owner@example.com", "pw"));
        let base_url = service.spawn().await.unwrap();
        let client = PetFriendsClient::with_base_url(base_url.clone());
        let key = service.account().await.key;

        // Announce a large multipart body and send only its first field
        let addr = base_url.trim_start_matches("http://").trim_end_matches('/');
        let mut upload = tokio::net::TcpStream::connect(addr).await.unwrap();
        let head = format!(
            "POST /api/pets HTTP/1.1\r\nHost: {addr}\r\nauth_key: {key}\r\n\
             Content-Type: multipart/form-data; boundary=XYZ\r\nContent-Length: 100000\r\n\r\n\
             --XYZ\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nTom\r\n"
        );
        upload.write_all(head.as_bytes()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let listing = tokio::time::timeout(
            Duration::from_secs(5),
            client.get_list_of_pets(&AuthKey::new(key), &Filter::All),
        )
        .await
        .expect("listing blocked by a pending upload")
        .unwrap();
        assert_eq!(listing.status, StatusCode::OK);
        drop(upload);
    }

    #[tokio::test]
    async fn test_orphaned_pets_not_listed_as_own() {
        let (service, client, key) = setup().await;
        service.set_orphan_new_pets(true).await;

        let created = client.add_new_pet_simple(&key, "Tom", "cat", "2").await.unwrap();
        assert_eq!(created.status, StatusCode::OK);

        let mine = client.get_list_of_pets(&key, &Filter::MyPets).await.unwrap();
        assert!(mine.parsed().unwrap().pets.is_empty());
        assert_eq!(service.pets().await.len(), 2);
    }

    #[tokio::test]
    async fn test_photo_stored_as_data_uri() {
        let (service, client, key) = setup().await;
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("cat.png");
        std::fs::write(&photo, b"\x89PNG\r\n\x1a\n").unwrap();

        let created = client
            .add_new_pet(&key, "Tom", "cat", "2", &photo)
            .await
            .unwrap();
        assert_eq!(created.status, StatusCode::OK);

        let stored = &service.pets().await[0];
        assert_eq!(stored.name, "Tom");
        assert!(stored.pet_photo.starts_with("data:image/png;base64,"));
    }
}

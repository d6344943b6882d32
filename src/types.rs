use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message the service returns (HTML-escaped) when credentials don't match an account
pub const USER_NOT_FOUND_MESSAGE: &str = "This user wasn&#x27;t found in database";

/// Message the service returns for a filter outside `""` / `"my_pets"`
pub const INCORRECT_FILTER_MESSAGE: &str = "Filter value is incorrect";

/// Pet listing filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every pet on the service
    All,
    /// Pets owned by the authenticated account
    MyPets,
    /// Any other value, sent verbatim (the service rejects it)
    Other(String),
}

impl Filter {
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "",
            Self::MyPets => "my_pets",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for Filter {
    fn from(value: &str) -> Self {
        match value {
            "" => Self::All,
            "my_pets" => Self::MyPets,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "<all>"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Opaque key issued by `api/key`, sent as the `auth_key` header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthKey {
    pub key: String,
}

impl AuthKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Pet record as returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: String,
    pub name: String,
    pub animal_type: String,
    /// Free-form; the service stores whatever was submitted
    pub age: String,
    /// `data:<mime>;base64,...` or empty when no photo was attached
    #[serde(default)]
    pub pet_photo: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Response of `api/pets`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PetList {
    pub pets: Vec<Pet>,
}

impl PetList {
    pub fn contains_id(&self, id: &str) -> bool {
        self.pets.iter().any(|pet| pet.id == id)
    }
}

/// Response body: parsed when the service answered with JSON of the expected
/// shape, raw text otherwise (error pages are HTML)
#[derive(Debug, Clone)]
pub enum Body<T> {
    Parsed(T),
    Raw(String),
}

/// Status code and body of a single API call
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub body: Body<T>,
}

impl<T> ApiResponse<T> {
    pub fn parsed(&self) -> Option<&T> {
        match &self.body {
            Body::Parsed(value) => Some(value),
            Body::Raw(_) => None,
        }
    }

    pub fn into_parsed(self) -> Option<T> {
        match self.body {
            Body::Parsed(value) => Some(value),
            Body::Raw(_) => None,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match &self.body {
            Body::Raw(text) => Some(text),
            Body::Parsed(_) => None,
        }
    }

    /// Whether the raw body mentions `needle`
    pub fn text_contains(&self, needle: &str) -> bool {
        self.raw().is_some_and(|text| text.contains(needle))
    }
}

impl<T: fmt::Debug> ApiResponse<T> {
    /// One-line description for assertion messages
    pub fn describe(&self) -> String {
        match &self.body {
            Body::Parsed(value) => format!("{} {:?}", self.status, value),
            Body::Raw(text) => format!("{} {}", self.status, text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_mapping() {
        assert_eq!(Filter::from(""), Filter::All);
        assert_eq!(Filter::from("my_pets"), Filter::MyPets);
        assert_eq!(Filter::from("qwerty"), Filter::Other("qwerty".to_string()));
        assert_eq!(Filter::All.as_str(), "");
        assert_eq!(Filter::MyPets.as_str(), "my_pets");
        assert_eq!(Filter::from("qwerty").as_str(), "qwerty");
    }

    #[test]
    fn test_pet_list_deserialization() {
        let json = r#"{"pets": [{
            "age": "4",
            "animal_type": "двортерьер",
            "created_at": "1700000000.0",
            "id": "b0c1d2",
            "name": "Барбоскин",
            "pet_photo": "",
            "user_id": "u1"
        }]}"#;

        let list: PetList = serde_json::from_str(json).unwrap();
        assert_eq!(list.pets.len(), 1);
        assert_eq!(list.pets[0].name, "Барбоскин");
        assert!(list.pets[0].pet_photo.is_empty());
        assert!(list.contains_id("b0c1d2"));
        assert!(!list.contains_id("missing"));
    }

    #[test]
    fn test_pet_without_optional_fields() {
        let json = r#"{"id": "1", "name": "", "animal_type": "cat", "age": "2"}"#;
        let pet: Pet = serde_json::from_str(json).unwrap();
        assert_eq!(pet.name, "");
        assert_eq!(pet.pet_photo, "");
        assert!(pet.user_id.is_none());
    }

    #[test]
    fn test_response_helpers() {
        let raw: ApiResponse<AuthKey> = ApiResponse {
            status: StatusCode::FORBIDDEN,
            body: Body::Raw(format!("<p>{}</p>", USER_NOT_FOUND_MESSAGE)),
        };
        assert!(raw.parsed().is_none());
        assert!(raw.text_contains(USER_NOT_FOUND_MESSAGE));
        assert!(raw.describe().starts_with("403"));

        let parsed = ApiResponse {
            status: StatusCode::OK,
            body: Body::Parsed(AuthKey::new("abc")),
        };
        assert!(!parsed.text_contains("abc"));
        assert_eq!(parsed.into_parsed().unwrap().key, "abc");
    }
}

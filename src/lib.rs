pub mod client;
pub mod credential;
pub mod mock;
pub mod scenarios;
pub mod types;

pub use client::PetFriendsClient;
pub use credential::{Credentials, Settings};
pub use mock::MockService;
pub use scenarios::{Report, ScenarioContext};
pub use types::{ApiResponse, AuthKey, Body, Filter, Pet, PetList};

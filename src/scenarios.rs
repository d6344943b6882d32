//! Assertion-driven scenarios against the PetFriends API.
//!
//! Every scenario gets its own auth key and creates whatever pets it needs,
//! then removes them again, so scenarios don't depend on each other or on
//! what the shared account already owns.

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow, bail, ensure};
use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::StatusCode;

use crate::client::PetFriendsClient;
use crate::credential::Settings;
use crate::types::{AuthKey, Filter, INCORRECT_FILTER_MESSAGE, Pet, USER_NOT_FOUND_MESSAGE};

pub struct ScenarioContext {
    pub client: PetFriendsClient,
    pub settings: Settings,
}

impl ScenarioContext {
    pub fn new(settings: Settings) -> Self {
        Self {
            client: PetFriendsClient::with_base_url(settings.base_url.clone()),
            settings,
        }
    }

    pub fn from_env() -> Self {
        Self::new(Settings::from_env())
    }
}

pub type ScenarioFn = for<'a> fn(&'a ScenarioContext) -> BoxFuture<'a, Result<()>>;

pub struct Scenario {
    pub name: &'static str,
    pub run: ScenarioFn,
}

pub struct ScenarioOutcome {
    pub name: &'static str,
    pub result: Result<()>,
    pub elapsed: Duration,
}

#[derive(Default)]
pub struct Report {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl Report {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

macro_rules! scenario_table {
    ($($name:ident),* $(,)?) => {
        vec![$(Scenario {
            name: stringify!($name),
            run: |ctx| $name(ctx).boxed(),
        }),*]
    };
}

/// Every scenario, in suite order
pub fn all() -> Vec<Scenario> {
    scenario_table![
        get_api_key_for_valid_user,
        get_all_pets_with_valid_key,
        add_new_pet_with_valid_data,
        successful_delete_self_pet,
        successful_update_self_pet_info,
        add_new_pet_no_photo_with_valid_data,
        add_pet_photo_valid_data,
        add_new_pet_simple_invalid_age,
        add_new_pet_with_invalid_symbols,
        add_pet_with_empty_name,
        get_api_key_for_invalid_username,
        get_api_key_for_invalid_password,
        get_all_pets_with_invalid_key,
        get_all_pets_with_incorrect_filter,
        get_my_pets_with_valid_key,
    ]
}

/// Run the scenarios whose name contains `name_filter`, one at a time.
/// A failing scenario is recorded and the run moves on.
pub async fn run(ctx: &ScenarioContext, name_filter: Option<&str>) -> Report {
    let mut report = Report::default();

    for scenario in all() {
        if name_filter.is_some_and(|f| !scenario.name.contains(f)) {
            continue;
        }

        let started = Instant::now();
        let result = (scenario.run)(ctx).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(()) => tracing::info!("PASS {} ({:?})", scenario.name, elapsed),
            Err(e) => tracing::error!("FAIL {} ({:?}): {:#}", scenario.name, elapsed, e),
        }

        report.outcomes.push(ScenarioOutcome {
            name: scenario.name,
            result,
            elapsed,
        });
    }

    report
}

/// Key for the valid account; anything but 200 + key is a failure
async fn auth(ctx: &ScenarioContext) -> Result<AuthKey> {
    let valid = &ctx.settings.valid;
    let response = ctx.client.get_api_key(&valid.email, &valid.password).await?;
    ensure!(
        response.status == StatusCode::OK,
        "Failed to get api key: {}",
        response.describe()
    );
    response
        .into_parsed()
        .ok_or_else(|| anyhow!("api/key answered 200 without a key"))
}

/// Create a photo-less pet the scenario owns
async fn create_fixture(
    ctx: &ScenarioContext,
    key: &AuthKey,
    name: &str,
    animal_type: &str,
    age: &str,
) -> Result<Pet> {
    let response = ctx
        .client
        .add_new_pet_simple(key, name, animal_type, age)
        .await?;
    ensure!(
        response.status == StatusCode::OK,
        "Failed to create fixture pet: {}",
        response.describe()
    );
    response
        .into_parsed()
        .ok_or_else(|| anyhow!("create_pet_simple answered 200 without a pet"))
}

/// Best-effort removal of a pet the scenario created
async fn remove(ctx: &ScenarioContext, key: &AuthKey, pet_id: &str) {
    match ctx.client.delete_pet(key, pet_id).await {
        Ok(response) if response.status == StatusCode::OK => {}
        Ok(response) => tracing::warn!("Cleanup of {} failed: {}", pet_id, response.status),
        Err(e) => tracing::warn!("Cleanup of {} failed: {:#}", pet_id, e),
    }
}

async fn get_api_key_for_valid_user(ctx: &ScenarioContext) -> Result<()> {
    let valid = &ctx.settings.valid;
    let response = ctx.client.get_api_key(&valid.email, &valid.password).await?;

    ensure!(response.status == StatusCode::OK, "{}", response.describe());
    ensure!(
        response.parsed().is_some_and(|k| !k.key.is_empty()),
        "No key in response: {}",
        response.describe()
    );
    Ok(())
}

async fn get_all_pets_with_valid_key(ctx: &ScenarioContext) -> Result<()> {
    let key = auth(ctx).await?;
    let response = ctx.client.get_list_of_pets(&key, &Filter::All).await?;

    ensure!(response.status == StatusCode::OK, "{}", response.describe());
    ensure!(
        response.parsed().is_some_and(|list| !list.pets.is_empty()),
        "Pet list is empty"
    );
    Ok(())
}

async fn add_new_pet_with_valid_data(ctx: &ScenarioContext) -> Result<()> {
    let name = "Барбоскин";
    let key = auth(ctx).await?;
    let response = ctx
        .client
        .add_new_pet(&key, name, "двортерьер", "4", &ctx.settings.photo)
        .await?;
    if let Some(pet) = response.parsed() {
        remove(ctx, &key, &pet.id).await;
    }

    ensure!(response.status == StatusCode::OK, "{}", response.describe());
    ensure!(
        response.parsed().is_some_and(|pet| pet.name == name),
        "Name not echoed: {}",
        response.describe()
    );
    Ok(())
}

async fn successful_delete_self_pet(ctx: &ScenarioContext) -> Result<()> {
    let key = auth(ctx).await?;
    let pet = create_fixture(ctx, &key, "Суперкот", "кот", "3").await?;

    let response = ctx.client.delete_pet(&key, &pet.id).await?;
    let listing = ctx.client.get_list_of_pets(&key, &Filter::MyPets).await?;

    ensure!(response.status == StatusCode::OK, "{}", response.describe());
    let Some(my_pets) = listing.parsed() else {
        bail!("Listing after delete failed: {}", listing.describe());
    };
    ensure!(
        !my_pets.contains_id(&pet.id),
        "Pet {} still listed after delete",
        pet.id
    );
    Ok(())
}

async fn successful_update_self_pet_info(ctx: &ScenarioContext) -> Result<()> {
    let (name, animal_type, age) = ("Мурзик", "Котэ", "5");
    let key = auth(ctx).await?;
    let fixture = create_fixture(ctx, &key, "Барсик", "кот", "3").await?;

    let outcome = async {
        let my_pets = ctx.client.get_list_of_pets(&key, &Filter::MyPets).await?;
        let has_pets = my_pets.parsed().is_some_and(|list| !list.pets.is_empty());
        if !has_pets {
            bail!("There is no my pets");
        }

        let response = ctx
            .client
            .update_pet_info(&key, &fixture.id, name, animal_type, age)
            .await?;
        ensure!(response.status == StatusCode::OK, "{}", response.describe());
        ensure!(
            response.parsed().is_some_and(|pet| pet.name == name),
            "Name not updated: {}",
            response.describe()
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;

    remove(ctx, &key, &fixture.id).await;
    outcome
}

async fn add_new_pet_no_photo_with_valid_data(ctx: &ScenarioContext) -> Result<()> {
    let name = "Барсик";
    let key = auth(ctx).await?;
    let response = ctx
        .client
        .add_new_pet_simple(&key, name, "дворокот", "6")
        .await?;
    if let Some(pet) = response.parsed() {
        remove(ctx, &key, &pet.id).await;
    }

    ensure!(response.status == StatusCode::OK, "{}", response.describe());
    let Some(pet) = response.parsed() else {
        bail!("Unexpected body: {}", response.describe());
    };
    ensure!(pet.name == name, "Name not echoed: {:?}", pet);
    ensure!(pet.pet_photo.is_empty(), "Photo should be empty");
    Ok(())
}

async fn add_pet_photo_valid_data(ctx: &ScenarioContext) -> Result<()> {
    let key = auth(ctx).await?;
    let fixture = create_fixture(ctx, &key, "Барсик", "жук", "4").await?;

    let outcome = async {
        let response = ctx
            .client
            .add_pet_photo(&key, &fixture.id, &ctx.settings.photo)
            .await?;
        ensure!(response.status == StatusCode::OK, "{}", response.describe());
        ensure!(
            response.parsed().is_some_and(|pet| !pet.pet_photo.is_empty()),
            "No pet_photo in response"
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;

    remove(ctx, &key, &fixture.id).await;
    outcome
}

/// The service accepts symbols as age
async fn add_new_pet_simple_invalid_age(ctx: &ScenarioContext) -> Result<()> {
    let key = auth(ctx).await?;
    let response = ctx
        .client
        .add_new_pet_simple(&key, "JPMorgan", "cat", "#@%$")
        .await?;
    if let Some(pet) = response.parsed() {
        remove(ctx, &key, &pet.id).await;
    }

    ensure!(response.status == StatusCode::OK, "{}", response.describe());
    Ok(())
}

async fn add_new_pet_with_invalid_symbols(ctx: &ScenarioContext) -> Result<()> {
    let (name, animal_type) = ("ASD#^", "$%DDdd");
    let key = auth(ctx).await?;
    let response = ctx
        .client
        .add_new_pet(&key, name, animal_type, "5", &ctx.settings.alt_photo)
        .await?;
    if let Some(pet) = response.parsed() {
        remove(ctx, &key, &pet.id).await;
    }

    ensure!(response.status == StatusCode::OK, "{}", response.describe());
    ensure!(
        response
            .parsed()
            .is_some_and(|pet| pet.name == name && pet.animal_type == animal_type),
        "Fields not echoed: {}",
        response.describe()
    );
    Ok(())
}

async fn add_pet_with_empty_name(ctx: &ScenarioContext) -> Result<()> {
    let key = auth(ctx).await?;
    let response = ctx
        .client
        .add_new_pet(&key, "", "cat", "2", &ctx.settings.photo)
        .await?;
    if let Some(pet) = response.parsed() {
        remove(ctx, &key, &pet.id).await;
    }

    ensure!(response.status == StatusCode::OK, "{}", response.describe());
    ensure!(
        response.parsed().is_some_and(|pet| pet.name.is_empty()),
        "Name should be empty: {}",
        response.describe()
    );
    Ok(())
}

async fn get_api_key_for_invalid_username(ctx: &ScenarioContext) -> Result<()> {
    let response = ctx
        .client
        .get_api_key(&ctx.settings.invalid.email, &ctx.settings.valid.password)
        .await?;

    ensure!(response.status == StatusCode::FORBIDDEN, "{}", response.describe());
    ensure!(
        response.text_contains(USER_NOT_FOUND_MESSAGE),
        "Missing error message: {}",
        response.describe()
    );
    Ok(())
}

async fn get_api_key_for_invalid_password(ctx: &ScenarioContext) -> Result<()> {
    let response = ctx
        .client
        .get_api_key(&ctx.settings.valid.email, &ctx.settings.invalid.password)
        .await?;

    ensure!(response.status == StatusCode::FORBIDDEN, "{}", response.describe());
    ensure!(
        response.text_contains(USER_NOT_FOUND_MESSAGE),
        "Missing error message: {}",
        response.describe()
    );
    Ok(())
}

async fn get_all_pets_with_invalid_key(ctx: &ScenarioContext) -> Result<()> {
    let response = ctx
        .client
        .get_list_of_pets(&AuthKey::new("123"), &Filter::All)
        .await?;

    ensure!(response.status == StatusCode::FORBIDDEN, "{}", response.describe());
    Ok(())
}

async fn get_all_pets_with_incorrect_filter(ctx: &ScenarioContext) -> Result<()> {
    let key = auth(ctx).await?;
    let response = ctx
        .client
        .get_list_of_pets(&key, &Filter::from("qwerty"))
        .await?;

    ensure!(
        response.status == StatusCode::INTERNAL_SERVER_ERROR,
        "{}",
        response.describe()
    );
    ensure!(
        response.text_contains(INCORRECT_FILTER_MESSAGE),
        "Missing error message: {}",
        response.describe()
    );
    Ok(())
}

async fn get_my_pets_with_valid_key(ctx: &ScenarioContext) -> Result<()> {
    let key = auth(ctx).await?;
    let fixture = create_fixture(ctx, &key, "Барсик", "Кот", "6").await?;

    let outcome = async {
        let response = ctx.client.get_list_of_pets(&key, &Filter::MyPets).await?;
        ensure!(response.status == StatusCode::OK, "{}", response.describe());
        ensure!(
            response.parsed().is_some_and(|list| !list.pets.is_empty()),
            "Own pet list is empty"
        );
        Ok::<_, anyhow::Error>(())
    }
    .await;

    remove(ctx, &key, &fixture.id).await;
    outcome
}

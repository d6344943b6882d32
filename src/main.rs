use std::env;

use anyhow::Result;
use petfriends_rs::{ScenarioContext, scenarios};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petfriends_rs=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("run");

    match command {
        "list" => {
            for scenario in scenarios::all() {
                println!("{}", scenario.name);
            }
            Ok(())
        }
        "run" => {
            let ctx = ScenarioContext::from_env();
            if ctx.settings.valid.email.is_empty() {
                eprintln!("Warning: PETFRIENDS_EMAIL is not set, authenticated scenarios will fail");
            }

            let name_filter = args.get(2).map(|s| s.as_str());
            tracing::info!("Running scenarios against {}", ctx.client.base_url());
            let report = scenarios::run(&ctx, name_filter).await;

            println!("\n{} passed, {} failed", report.passed(), report.failed());
            for outcome in report.outcomes.iter().filter(|o| o.result.is_err()) {
                if let Err(e) = &outcome.result {
                    println!("  {}: {:#}", outcome.name, e);
                }
            }

            if !report.is_success() {
                std::process::exit(1);
            }
            Ok(())
        }
        _ => {
            let program = args.first().map_or("petfriends-rs", String::as_str);
            eprintln!("Usage: {} [list | run [name_filter]]", program);
            eprintln!("  list: print scenario names");
            eprintln!("  run: run scenarios (optionally only those whose name contains name_filter)");
            eprintln!("Environment: PETFRIENDS_BASE_URL, PETFRIENDS_EMAIL, PETFRIENDS_PASSWORD,");
            eprintln!("  PETFRIENDS_INVALID_EMAIL, PETFRIENDS_INVALID_PASSWORD, PETFRIENDS_PHOTO, PETFRIENDS_ALT_PHOTO");
            std::process::exit(1);
        }
    }
}

use anyhow::{bail, Context};
use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quiz_engine::{
    config::Config, metrics::render_metrics, services::draft_store::DraftKey, AppState,
};

const USAGE: &str = "usage: quiz-engine <command>

commands:
  ingest <path>                                   load a tagged question document
  categories                                      list question categories
  sample <cat1,cat2,...> [perCategory]            assemble a quiz and save it as a draft
  replace <draft-key> <category> <questionId>     swap one question of a saved draft
  metrics                                         print metrics in Prometheus text format";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!(USAGE);
    };

    if command == "metrics" {
        print!("{}", render_metrics()?);
        return Ok(());
    }

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        "Configuration loaded for environment: {:?}",
        std::env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string())
    );

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    tracing::info!("MongoDB client created");

    let state = AppState::new(config, mongo_client)
        .await
        .context("Failed to initialize application state")?;

    match (command.as_str(), &args[1..]) {
        ("ingest", [path]) => {
            let report = state.ingestion().ingest_file(Path::new(path)).await?;
            println!(
                "ingested {} questions ({} category links, {} answers)",
                report.question_ids.len(),
                report.categories_linked,
                report.answers_inserted
            );
        }
        ("categories", []) => {
            for category in state.categories().list_categories().await? {
                println!("{}\t{}", category.id, category.name);
            }
        }
        ("sample", [categories, rest @ ..]) if rest.len() <= 1 => {
            let categories = split_categories(categories);
            let per_category = match rest.first() {
                Some(raw) => raw
                    .parse::<u32>()
                    .with_context(|| format!("perCategory must be a number, got '{}'", raw))?,
                None => state.config.default_per_category,
            };

            let draft = state
                .draft_service()
                .create_draft(&categories, per_category)
                .await?;
            println!("{}", draft.key);
            println!("{}", serde_json::to_string_pretty(&draft.quiz)?);
        }
        ("replace", [key, category, question_id]) => {
            let key = DraftKey::parse(key)?;
            let question_id = question_id
                .parse::<i64>()
                .with_context(|| format!("questionId must be a number, got '{}'", question_id))?;

            let quiz = state
                .draft_service()
                .replace_in_draft(&key, category, question_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&quiz)?);
        }
        _ => bail!(USAGE),
    }

    Ok(())
}

/// `LOG_FORMAT=json` switches to structured JSON lines; `RUST_LOG` overrides the filter.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "quiz_engine=debug".into()),
        )
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn split_categories(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub store_timeout_ms: u64,
    pub drafts_dir: String,
    pub default_per_category: u32,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            // Override with environment variables (prefix: QUIZ__)
            .add_source(config::Environment::with_prefix("QUIZ").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "quizbank".to_string());

        let store_timeout_ms = numeric_setting(&settings, "store.timeout_ms", "STORE_TIMEOUT_MS")?
            .unwrap_or(5000);

        let drafts_dir = settings
            .get_string("drafts.dir")
            .or_else(|_| env::var("DRAFTS_DIR"))
            .unwrap_or_else(|_| "var/quiz-drafts".to_string());

        let default_per_category = numeric_setting(
            &settings,
            "quiz.default_per_category",
            "DEFAULT_PER_CATEGORY",
        )?
        .unwrap_or(5);

        if store_timeout_ms == 0 {
            return Err(config::ConfigError::Message(
                "store.timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            mongo_uri,
            mongo_database,
            store_timeout_ms,
            drafts_dir,
            default_per_category,
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

/// Reads a numeric key from `settings`, then from the plain `env_var`.
/// Present but unparseable values are errors rather than silent defaults.
fn numeric_setting<T>(
    settings: &config::Config,
    key: &str,
    env_var: &str,
) -> Result<Option<T>, config::ConfigError>
where
    T: std::str::FromStr,
{
    let raw = match settings.get_string(key) {
        Ok(value) => Some(value),
        Err(config::ConfigError::NotFound(_)) => env::var(env_var).ok(),
        Err(e) => return Err(e),
    };

    match raw {
        Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
            config::ConfigError::Message(format!("{} must be a number, got '{}'", key, value))
        }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 6] = [
        "MONGO_URI",
        "MONGO_DATABASE",
        "STORE_TIMEOUT_MS",
        "DRAFTS_DIR",
        "DEFAULT_PER_CATEGORY",
        "QUIZ__STORE__TIMEOUT_MS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_apply_without_environment() {
        clear_env();
        let config = Config::load().expect("load defaults");
        assert_eq!(config.mongo_database, "quizbank");
        assert_eq!(config.store_timeout(), Duration::from_millis(5000));
        assert_eq!(config.drafts_dir, "var/quiz-drafts");
        assert_eq!(config.default_per_category, 5);
    }

    #[test]
    #[serial]
    fn test_plain_environment_variables_override_defaults() {
        clear_env();
        env::set_var("MONGO_DATABASE", "quiz_test");
        env::set_var("STORE_TIMEOUT_MS", "250");
        env::set_var("DEFAULT_PER_CATEGORY", "3");

        let config = Config::load().expect("load from env");
        assert_eq!(config.mongo_database, "quiz_test");
        assert_eq!(config.store_timeout_ms, 250);
        assert_eq!(config.default_per_category, 3);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_prefixed_variables_win_over_plain_ones() {
        clear_env();
        env::set_var("STORE_TIMEOUT_MS", "250");
        env::set_var("QUIZ__STORE__TIMEOUT_MS", "900");

        let config = Config::load().expect("load prefixed env");
        assert_eq!(config.store_timeout_ms, 900);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_non_numeric_timeout_is_rejected() {
        clear_env();
        env::set_var("STORE_TIMEOUT_MS", "soon");
        assert!(Config::load().is_err());
        clear_env();
    }
}

use serde::Deserialize;
use std::env;

/// Free-tier learners are capped at this lesson position unless overridden.
/// Flagged with product as possibly a placeholder; keep it configurable.
const DEFAULT_FREE_LESSON_CEILING: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub redis_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    /// External question-generator service; the Mongo bank is the fallback.
    pub generator_api_url: String,
    pub free_lesson_ceiling: usize,
    pub smtp: Option<SmtpSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub from_name: String,
    pub from_email: String,
    pub use_tls: bool,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017/linguahub".to_string());

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "linguahub".to_string());

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let generator_api_url = settings
            .get_string("generator.url")
            .or_else(|_| env::var("GENERATOR_API_URL"))
            .unwrap_or_else(|_| "http://localhost:8000".to_string());

        let free_lesson_ceiling = settings
            .get_int("progress.free_lesson_ceiling")
            .ok()
            .and_then(|v| usize::try_from(v).ok())
            .or_else(|| {
                env::var("FREE_LESSON_CEILING")
                    .ok()
                    .and_then(|v| v.parse().ok())
            })
            .unwrap_or(DEFAULT_FREE_LESSON_CEILING);

        let smtp = Self::load_smtp(&settings);
        if smtp.is_none() {
            eprintln!("WARNING: SMTP not configured, placement result emails are disabled");
        }

        Ok(Config {
            mongo_uri,
            redis_uri,
            mongo_database,
            jwt_secret,
            generator_api_url,
            free_lesson_ceiling,
            smtp,
        })
    }

    fn load_smtp(settings: &config::Config) -> Option<SmtpSettings> {
        let server = settings
            .get_string("smtp.server")
            .or_else(|_| env::var("SMTP_SERVER"))
            .ok()?;

        let port = settings
            .get_int("smtp.port")
            .ok()
            .and_then(|v| u16::try_from(v).ok())
            .or_else(|| env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(587);

        let login = settings
            .get_string("smtp.login")
            .or_else(|_| env::var("SMTP_LOGIN"))
            .unwrap_or_default();
        let password = settings
            .get_string("smtp.password")
            .or_else(|_| env::var("SMTP_PASSWORD"))
            .unwrap_or_default();

        let from_name = settings
            .get_string("smtp.from_name")
            .or_else(|_| env::var("SMTP_FROM_NAME"))
            .unwrap_or_else(|_| "LinguaHub".to_string());
        let from_email = settings
            .get_string("smtp.from_email")
            .or_else(|_| env::var("SMTP_FROM_EMAIL"))
            .unwrap_or_else(|_| "noreply@linguahub.example".to_string());

        let use_tls = settings
            .get_bool("smtp.use_tls")
            .ok()
            .or_else(|| env::var("SMTP_USE_TLS").ok().map(|v| v != "0"))
            .unwrap_or(true);

        Some(SmtpSettings {
            server,
            port,
            login,
            password,
            from_name,
            from_email,
            use_tls,
        })
    }
}

//! Runtime settings read from the environment. Call `dotenvy::dotenv()` first to pick up a `.env`.

use std::path::PathBuf;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/modelkit";
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_MODEL_ROOT: &str = "models";

#[derive(Clone, Debug)]
pub struct Settings {
    /// `DATABASE_URL`
    pub database_url: String,
    /// `MODELKIT_SCHEMA`: schema every model table is created in.
    pub schema: String,
    /// `MODELKIT_MAX_CONNECTIONS`
    pub max_connections: u32,
    /// `MODELKIT_MODEL_ROOT`: directory scanned for `*.json` model sources.
    pub model_root: PathBuf,
    /// `MODELKIT_BCRYPT_COST`: cost for password columns.
    pub bcrypt_cost: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: DEFAULT_DATABASE_URL.into(),
            schema: DEFAULT_SCHEMA.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            model_root: PathBuf::from(DEFAULT_MODEL_ROOT),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Unparsable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Settings::default();
        let num = |key: &str, default: u32| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(default)
        };
        Settings {
            database_url: lookup("DATABASE_URL").unwrap_or(d.database_url),
            schema: lookup("MODELKIT_SCHEMA").unwrap_or(d.schema),
            max_connections: num("MODELKIT_MAX_CONNECTIONS", d.max_connections),
            model_root: lookup("MODELKIT_MODEL_ROOT").map(PathBuf::from).unwrap_or(d.model_root),
            bcrypt_cost: num("MODELKIT_BCRYPT_COST", d.bcrypt_cost),
        }
    }
}

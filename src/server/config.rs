use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub jwt_secret: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    #[serde(default = "default_media_url")]
    pub media_url: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_page_size")]
    pub default_page_size: u64,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    jwt_secret: Option<String>,
    bind_address: Option<String>,
    media_dir: Option<String>,
    media_url: Option<String>,
    log_dir: Option<String>,
    default_page_size: Option<u64>,
    token_ttl_hours: Option<i64>,
    db_max_connections: Option<u32>,
    password_hash_cost: Option<u32>,
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_media_url() -> String {
    "/media/".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_page_size() -> u64 {
    6
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config: PartialServerConfig = match config_path {
            Some(path_str) => {
                let path = Path::new(path_str);
                if path.exists() {
                    let contents = fs::read_to_string(path)
                        .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
                    toml::from_str(&contents).map_err(|e| {
                        format!("Failed to parse TOML from config file at {path:?}: {e}")
                    })?
                } else {
                    PartialServerConfig::default()
                }
            }
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn merge(env: PartialServerConfig, file: PartialServerConfig) -> Result<Self, String> {
        let mut media_url = env
            .media_url
            .or(file.media_url)
            .unwrap_or_else(default_media_url);
        if !media_url.ends_with('/') {
            media_url.push('/');
        }

        Ok(ServerConfig {
            database_url: env
                .database_url
                .or(file.database_url)
                .ok_or("DATABASE_URL is required")?,
            jwt_secret: env
                .jwt_secret
                .or(file.jwt_secret)
                .ok_or("JWT_SECRET is required")?,
            bind_address: env
                .bind_address
                .or(file.bind_address)
                .unwrap_or_else(default_bind_address),
            media_dir: env
                .media_dir
                .or(file.media_dir)
                .unwrap_or_else(default_media_dir),
            media_url,
            log_dir: env.log_dir.or(file.log_dir).unwrap_or_else(default_log_dir),
            default_page_size: env
                .default_page_size
                .or(file.default_page_size)
                .unwrap_or_else(default_page_size),
            token_ttl_hours: env
                .token_ttl_hours
                .or(file.token_ttl_hours)
                .unwrap_or_else(default_token_ttl_hours),
            db_max_connections: env
                .db_max_connections
                .or(file.db_max_connections)
                .unwrap_or_else(default_db_max_connections),
            password_hash_cost: env
                .password_hash_cost
                .or(file.password_hash_cost)
                .unwrap_or_else(default_password_hash_cost),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_file() {
        let file: PartialServerConfig = toml::from_str(
            r#"
            database_url = "postgres://file"
            jwt_secret = "from-file"
            default_page_size = 10
            "#,
        )
        .unwrap();
        let env = PartialServerConfig {
            jwt_secret: Some("from-env".to_string()),
            ..Default::default()
        };

        let config = ServerConfig::merge(env, file).unwrap();
        assert_eq!(config.database_url, "postgres://file");
        assert_eq!(config.jwt_secret, "from-env");
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.bind_address, "0.0.0.0:8000");
    }

    #[test]
    fn missing_secret_is_an_error() {
        let file = PartialServerConfig {
            database_url: Some("sqlite::memory:".to_string()),
            ..Default::default()
        };
        let err = ServerConfig::merge(PartialServerConfig::default(), file).unwrap_err();
        assert!(err.contains("JWT_SECRET"));
    }

    #[test]
    fn media_url_gets_trailing_slash() {
        let env = PartialServerConfig {
            database_url: Some("sqlite::memory:".to_string()),
            jwt_secret: Some("s".to_string()),
            media_url: Some("/uploads".to_string()),
            ..Default::default()
        };
        let config = ServerConfig::merge(env, PartialServerConfig::default()).unwrap();
        assert_eq!(config.media_url, "/uploads/");
    }
}

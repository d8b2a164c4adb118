use anyhow::Context;
use axum::http::HeaderValue;
use serde::Deserialize;
use std::env;
use std::fs;
use std::str::FromStr;

/// 実行環境を表すenum
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(anyhow::anyhow!("Invalid environment: {}", s)),
        }
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Environment::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub jwt: JwtConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub env: Environment,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// 環境に応じたallowed_originsをHeaderValueとして取得
    ///
    /// # Errors
    /// プロダクション環境でallowed_originsが設定されていない場合にエラーを返す
    pub fn get_allowed_origins(
        &self,
        addr: &std::net::SocketAddr,
    ) -> anyhow::Result<Vec<HeaderValue>> {
        let origin_strings = match self.env {
            Environment::Production => {
                // プロダクション環境では明示的な指定が必須
                if self.allowed_origins.is_empty() {
                    anyhow::bail!(
                        "Production environment requires explicit ALLOWED_ORIGINS configuration. \
                        Set ALLOWED_ORIGINS environment variable"
                    );
                }
                self.allowed_origins.clone()
            }
            Environment::Development => {
                // 開発環境: ローカルホスト関連のオリジンを許可
                let mut origins = vec![
                    format!("http://localhost:{}", addr.port()),
                    format!("http://127.0.0.1:{}", addr.port()),
                    "http://localhost:5173".to_string(),
                    format!("http://{}", addr),
                ];
                origins.extend(self.allowed_origins.clone());
                origins
            }
        };

        // 変換に失敗したものはログ出力してスキップ
        let headers: Vec<HeaderValue> = origin_strings
            .into_iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(header_value) => {
                    tracing::debug!(%origin, "Allowed origin");
                    Some(header_value)
                }
                Err(e) => {
                    tracing::warn!(%origin, error = %e, "Failed to parse origin");
                    None
                }
            })
            .collect();

        if headers.is_empty() {
            anyhow::bail!("No valid CORS origins configured");
        }

        Ok(headers)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    DynamoDb,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "dynamodb" => Ok(StoreBackend::DynamoDb),
            _ => Err(anyhow::anyhow!("Invalid store backend: {}", s)),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// ストアの接続設定。メモ操作側はどのバックエンドかを意識しない
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub table_name: String,
    /// DynamoDB Local などのエンドポイント
    #[serde(default)]
    pub endpoint_override: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub credentials: Option<StoreCredentials>,
    /// 起動時にテーブルが無ければ作成する
    #[serde(default)]
    pub create_table: bool,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // 環境変数から読み込む場合
        if let Ok(table_name) = env::var("TABLE_NAME") {
            let credentials = match (
                env::var("STORE_ACCESS_KEY_ID"),
                env::var("STORE_SECRET_ACCESS_KEY"),
            ) {
                (Ok(access_key_id), Ok(secret_access_key)) => Some(StoreCredentials {
                    access_key_id,
                    secret_access_key,
                }),
                _ => None,
            };

            let config = Config {
                server: ServerConfig {
                    host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                    port: env::var("SERVER_PORT")
                        .unwrap_or_else(|_| "5050".to_string())
                        .parse()
                        .context("Invalid SERVER_PORT")?,
                    env: env::var("ENVIRONMENT")
                        .ok()
                        .map(|s| Environment::from_str(&s))
                        .transpose()?
                        .unwrap_or_default(),
                    allowed_origins: env::var("ALLOWED_ORIGINS")
                        .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                        .unwrap_or_default(),
                },
                logging: LoggingConfig {
                    level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
                },
                jwt: JwtConfig {
                    secret: env::var("JWT_SECRET")
                        .context("JWT_SECRET must be set when using env vars")?,
                    audience: env::var("JWT_AUDIENCE").ok(),
                    issuer: env::var("JWT_ISSUER").ok(),
                },
                store: StoreConfig {
                    backend: env::var("STORE_BACKEND")
                        .ok()
                        .map(|s| StoreBackend::from_str(&s))
                        .transpose()?
                        .unwrap_or_default(),
                    table_name,
                    endpoint_override: env::var("DYNAMODB_ENDPOINT").ok(),
                    region: env::var("AWS_REGION").ok(),
                    credentials,
                    create_table: env_flag("CREATE_TABLE"),
                },
            };
            config.validate()?;
            return Ok(config);
        }

        // Config.tomlから読み込む場合（ローカル開発）
        let config_str = fs::read_to_string("Config.toml").context(
            "Failed to read Config.toml. Use environment variables or provide Config.toml",
        )?;
        let mut config = Self::from_toml_str(&config_str)?;

        // 環境変数があれば優先する
        if let Ok(secret) = env::var("JWT_SECRET") {
            config.jwt.secret = secret;
        }
        if let Ok(endpoint) = env::var("DYNAMODB_ENDPOINT") {
            config.store.endpoint_override = Some(endpoint);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse Config.toml")
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.secret.trim().is_empty() {
            anyhow::bail!("JWT secret must not be empty");
        }
        if self.store.table_name.trim().is_empty() {
            anyhow::bail!("store.table_name must not be empty");
        }
        Ok(())
    }
}

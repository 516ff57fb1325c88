use crate::constants;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub test_cases: TestCasesConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the hosted repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_repo_path")]
    pub repo_path: String,
    /// Name of the environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default = "default_days_before")]
    pub days_before: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCasesConfig {
    /// Known modules, in the order their test lists are requested.
    #[serde(default = "default_modules")]
    pub modules: Vec<String>,
    /// Path of the test list file; `{module}` is substituted.
    #[serde(default = "default_test_list_path")]
    pub test_list_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_nearby_limit")]
    pub nearby_limit: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u32,
    #[serde(default = "default_cache_size")]
    pub cache_size: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_api_base() -> String {
    "https://api.github.com".into()
}
fn default_repo_path() -> String {
    "MESAHub/mesa".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_per_page() -> u32 {
    100
}
fn default_user_agent() -> String {
    concat!("testhub/", env!("CARGO_PKG_VERSION")).into()
}
fn default_branch() -> String {
    constants::DEFAULT_BRANCH.into()
}
fn default_days_before() -> i64 {
    constants::DEFAULT_DAYS_BEFORE
}
fn default_modules() -> Vec<String> {
    vec!["star".into(), "binary".into(), "astero".into()]
}
fn default_test_list_path() -> String {
    constants::DEFAULT_TEST_LIST_PATH.into()
}
fn default_nearby_limit() -> usize {
    constants::DEFAULT_NEARBY_LIMIT
}
fn default_page_size() -> usize {
    constants::DEFAULT_PAGE_SIZE
}
fn default_data_dir() -> String {
    format!("~/{}", constants::DEFAULT_DATA_DIR)
}
fn default_busy_timeout() -> u32 {
    5000
}
fn default_cache_size() -> i32 {
    -64000
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            repo_path: default_repo_path(),
            token_env: default_token_env(),
            timeout_ms: default_timeout_ms(),
            per_page: default_per_page(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_branch: default_branch(),
            days_before: default_days_before(),
        }
    }
}

impl Default for TestCasesConfig {
    fn default() -> Self {
        Self {
            modules: default_modules(),
            test_list_path: default_test_list_path(),
        }
    }
}

impl TestCasesConfig {
    /// Repository path of the test list file for `module`.
    pub fn test_list_path_for(&self, module: &str) -> String {
        self.test_list_path.replace("{module}", module)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            nearby_limit: default_nearby_limit(),
            page_size: default_page_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            busy_timeout_ms: default_busy_timeout(),
            cache_size: default_cache_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration with layered precedence:
    /// 1. Explicit config file (from `--config` flag, highest priority)
    /// 2. Project config: `<project_root>/.testhub/config.toml`
    /// 3. Global config: `~/.testhub/config.toml`
    /// 4. Built-in defaults (lowest priority)
    ///
    /// Environment overrides are applied on top of all file layers.
    pub fn load(project_root: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_file(project_root, None)
    }

    /// Load configuration with an explicit config file path (highest priority layer).
    pub fn load_with_file(
        project_root: Option<&Path>,
        config_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        if let Some(home) = dirs::home_dir() {
            let global_path = home.join(constants::DEFAULT_DATA_DIR).join("config.toml");
            if global_path.exists() {
                let raw = load_toml_value(&global_path)?;
                merge_toml_values(&mut merged, &raw);
            }
        }

        if let Some(root) = project_root {
            let project_path = root.join(constants::PROJECT_CONFIG_FILE);
            if project_path.exists() {
                let raw = load_toml_value(&project_path)?;
                merge_toml_values(&mut merged, &raw);
            }
        }

        if let Some(cf) = config_file {
            if !cf.exists() {
                return Err(ConfigError::NotFound {
                    path: cf.display().to_string(),
                });
            }
            let raw = load_toml_value(cf)?;
            merge_toml_values(&mut merged, &raw);
        }

        let config_str =
            toml::to_string(&merged).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        let mut config: Config =
            toml::from_str(&config_str).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        apply_env_overrides(&mut config);
        config.validate()?;

        config.storage.data_dir = expand_tilde(&config.storage.data_dir);

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.remote.repo_path.contains('/') {
            return Err(ConfigError::InvalidValue {
                field: "remote.repo_path".into(),
                reason: format!("expected owner/name, got '{}'", self.remote.repo_path),
            });
        }
        if self.sync.days_before <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "sync.days_before".into(),
                reason: "must be positive".into(),
            });
        }
        if self.query.nearby_limit == 0 || self.query.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "query".into(),
                reason: "limits must be positive".into(),
            });
        }
        Ok(())
    }

    /// Resolve the SQLite database path for the configured repository.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.data_dir)
            .join("data")
            .join(repo_slug(&self.remote.repo_path))
            .join(constants::STATE_DB_FILE)
    }
}

/// Filesystem-safe name for an `owner/name` repository path.
pub fn repo_slug(repo_path: &str) -> String {
    repo_path
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Load a TOML file as a raw `toml::Value` (preserving only explicitly-set fields).
fn load_toml_value(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    content
        .parse::<toml::Value>()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Deep-merge `overlay` into `base`. Only keys present in `overlay` are written.
fn merge_toml_values(base: &mut toml::Value, overlay: &toml::Value) {
    if let (toml::Value::Table(base_map), toml::Value::Table(overlay_map)) = (base, overlay) {
        for (key, overlay_val) in overlay_map {
            if let Some(base_val) = base_map.get_mut(key) {
                if base_val.is_table() && overlay_val.is_table() {
                    merge_toml_values(base_val, overlay_val);
                } else {
                    *base_val = overlay_val.clone();
                }
            } else {
                base_map.insert(key.clone(), overlay_val.clone());
            }
        }
    }
}

/// Apply environment variable overrides to config fields.
/// Convention: `TESTHUB_<SECTION>_<KEY>` in UPPER_SNAKE_CASE.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(v) = std::env::var("TESTHUB_REMOTE_API_BASE") {
        config.remote.api_base = v;
    }
    if let Ok(v) = std::env::var("TESTHUB_REMOTE_REPO_PATH") {
        config.remote.repo_path = v;
    }
    if let Ok(v) = std::env::var("TESTHUB_REMOTE_TOKEN_ENV") {
        config.remote.token_env = v;
    }
    if let Ok(v) = std::env::var("TESTHUB_REMOTE_TIMEOUT_MS")
        && let Ok(n) = v.parse()
    {
        config.remote.timeout_ms = n;
    }
    if let Ok(v) = std::env::var("TESTHUB_SYNC_DEFAULT_BRANCH") {
        config.sync.default_branch = v;
    }
    if let Ok(v) = std::env::var("TESTHUB_SYNC_DAYS_BEFORE")
        && let Ok(n) = v.parse()
    {
        config.sync.days_before = n;
    }
    if let Ok(v) = std::env::var("TESTHUB_TEST_CASES_MODULES") {
        config.test_cases.modules = v
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(ToString::to_string)
            .collect();
    }
    if let Ok(v) = std::env::var("TESTHUB_STORAGE_DATA_DIR") {
        config.storage.data_dir = v;
    }
    if let Ok(v) = std::env::var("TESTHUB_STORAGE_BUSY_TIMEOUT_MS")
        && let Ok(n) = v.parse()
    {
        config.storage.busy_timeout_ms = n;
    }
    if let Ok(v) = std::env::var("TESTHUB_LOGGING_LEVEL") {
        config.logging.level = v;
    }
}

fn expand_tilde(path: &str) -> String {
    if path.starts_with('~')
        && let Some(home) = dirs::home_dir()
    {
        return path.replacen('~', &home.to_string_lossy(), 1);
    }
    path.to_string()
}

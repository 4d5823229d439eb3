//! 配置加载：toml 文件 + 默认值补全

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

/// 全局配置实例
static CONFIG: OnceLock<Config> = OnceLock::new();

/// 系统配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub queue: QueueConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub name: String,
    pub port: u16,
    pub debug: bool,
    pub copyright: String,
    /// 请求超时时间（秒）
    pub timeout_seconds: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志目录，为空时只输出到控制台
    pub log_path: Option<PathBuf>,
    pub file_prefix: String,
    /// 日志级别 (trace, debug, info, warn, error)
    pub level: String,
}

/// 数据库配置，空值在 `apply_defaults` 中补全
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: String,
    pub dbname: String,
    pub username: String,
    pub password: String,
    #[serde(rename = "maxIdleConns")]
    pub max_idle_conns: u32,
    #[serde(rename = "maxOpenConns")]
    pub max_open_conns: u32,
}

/// Redis 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub host: String,
    pub port: String,
    pub select: i64,
    pub password: String,
    pub prefix: String,
}

/// JWT 配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
}

/// 本地对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root_dir: PathBuf,
    pub base_url: String,
}

/// 消息队列配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// 队列 key 的前缀
    pub key_prefix: String,
    /// 阻塞读取的超时时间（秒）
    pub poll_timeout_seconds: u64,
    /// 首次重新投递的延迟（毫秒），之后每次翻倍
    pub requeue_delay_ms: u64,
    /// 重新投递延迟的上限（毫秒）
    pub max_requeue_delay_ms: u64,
    /// 最多处理次数，超过后移入死信列表，0 表示不限制
    pub max_attempts: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            name: "backend-kit".to_string(),
            port: 8080,
            debug: false,
            copyright: String::new(),
            timeout_seconds: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            file_prefix: "app".to_string(),
            level: "info".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./uploads"),
            base_url: "/uploads".to_string(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            key_prefix: "queue:".to_string(),
            poll_timeout_seconds: 5,
            requeue_delay_ms: 1000,
            max_requeue_delay_ms: 60_000,
            max_attempts: 10,
        }
    }
}

/// 字符串为空时使用默认值
pub fn string_value(value: &mut String, default_value: &str) {
    if value.is_empty() {
        *value = default_value.to_string();
    }
}

/// 数值为 0 时使用默认值
pub fn int_value<T: Default + PartialEq>(value: &mut T, default_value: T) {
    if *value == T::default() {
        *value = default_value;
    }
}

impl DatabaseConfig {
    pub fn apply_defaults(&mut self) {
        string_value(&mut self.host, "127.0.0.1");
        string_value(&mut self.port, "5432");
        string_value(&mut self.username, "postgres");
        int_value(&mut self.max_idle_conns, 10);
        int_value(&mut self.max_open_conns, 100);
    }

    /// 生成 postgres 连接串
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.dbname
        )
    }

    /// 用于日志展示的地址，不含密码
    pub fn display_addr(&self) -> String {
        format!("{}:{} db:{}", self.host, self.port, self.dbname)
    }
}

impl RedisConfig {
    pub fn apply_defaults(&mut self) {
        string_value(&mut self.host, "127.0.0.1");
        string_value(&mut self.port, "6379");
    }

    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.select)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.select
            )
        }
    }

    pub fn display_addr(&self) -> String {
        format!("{}:{} db:{}", self.host, self.port, self.select)
    }
}

impl Config {
    /// 从配置文件加载配置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::FileRead(e.to_string()))?;

        let mut config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.apply_defaults();

        Ok(config)
    }

    /// 保存配置到文件
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::FileWrite(e.to_string()))?;
        }

        fs::write(path.as_ref(), content).map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    pub fn apply_defaults(&mut self) {
        self.database.apply_defaults();
        self.redis.apply_defaults();
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.port == 0 {
            return Err(ConfigError::Validation("HTTP端口必须大于0".to_string()));
        }
        if self.http.name.is_empty() {
            return Err(ConfigError::Validation("项目名称不能为空".to_string()));
        }
        if self.database.max_open_conns < self.database.max_idle_conns {
            return Err(ConfigError::Validation(
                "最大连接数不能小于最大空闲数".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "无效的日志级别: {}，有效值: {:?}",
                self.logging.level, valid_levels
            )));
        }

        Ok(())
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("文件读取错误: {0}")]
    FileRead(String),
    #[error("文件写入错误: {0}")]
    FileWrite(String),
    #[error("配置解析错误: {0}")]
    Parse(String),
    #[error("配置序列化错误: {0}")]
    Serialize(String),
    #[error("配置验证错误: {0}")]
    Validation(String),
}

/// 初始化全局配置
pub fn init_config() -> Result<&'static Config, ConfigError> {
    let config = load_config()?;
    config.validate()?;

    CONFIG
        .set(config)
        .map_err(|_| ConfigError::Validation("配置已经初始化".to_string()))?;

    get_config().ok_or_else(|| ConfigError::Validation("配置未初始化".to_string()))
}

/// 从文件或默认值加载配置
pub fn load_config() -> Result<Config, ConfigError> {
    let config_paths = ["config.toml", "./config/config.toml"];

    for path in &config_paths {
        if Path::new(path).exists() {
            info!("从配置文件加载: {}", path);
            return Config::load_from_file(path);
        }
    }

    info!("未找到配置文件，使用默认配置");
    let mut config = Config::default();
    config.apply_defaults();
    Ok(config)
}

/// 获取全局配置实例
pub fn get_config() -> Option<&'static Config> {
    CONFIG.get()
}

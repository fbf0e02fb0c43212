use serde::{Deserialize, Serialize};

/// 应用配置：可选的 config.toml + SL 前缀环境变量（__ 分隔），环境变量优先
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageSettings,
    pub deletion: DeletionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// memory | file | sqlite | postgres
    pub backend: String,
    /// sqlite / postgres 的连接串
    pub database_url: String,
    /// file 后端的数据文件路径
    pub file_path: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            backend: "memory".to_string(),
            database_url: String::new(),
            file_path: "links.jsonl".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeletionSettings {
    /// 删除队列容量，写满后提交方阻塞
    pub queue_capacity: usize,
    /// 工作者数量，0 表示按可用 CPU 数
    pub workers: usize,
}

impl Default for DeletionSettings {
    fn default() -> Self {
        DeletionSettings {
            queue_capacity: 100,
            workers: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// 为空则输出到控制台
    pub file: Option<String>,
    pub enable_rotation: bool,
    pub max_backups: u32,
    /// "text" 或 "json"
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: "info".to_string(),
            file: None,
            enable_rotation: true,
            max_backups: 7,
            format: "text".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Self {
        use config::{Config, Environment, File};

        let _ = dotenvy::dotenv();

        let path = "config.toml";

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖，前缀 SL，分隔符 __
            .add_source(
                Environment::with_prefix("SL")
                    .separator("__")
                    .try_parsing(true),
            );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<AppConfig>() {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("[ERROR] Failed to deserialize config: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[ERROR] Failed to build config: {}", e);
                Self::default()
            }
        }
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.deletion.queue_capacity, 100);
        assert_eq!(config.deletion.workers, 0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_sample_config_is_valid_toml() {
        let sample = AppConfig::generate_sample_config();
        let parsed: AppConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.storage.backend, "memory");
    }
}

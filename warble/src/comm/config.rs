use anyhow::{anyhow, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref GLOBAL_CONFIG_MANAGER: RwLock<Option<Arc<ConfigManager>>> = RwLock::new(None);
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },
    #[error("配置项 '{key}' 不存在")]
    KeyNotFound { key: String },
    #[error("配置项 '{key}' 类型转换失败: {message}")]
    TypeConversionError { key: String, message: String },
    #[error("配置初始化失败: {message}")]
    InitializationError { message: String },
}

/// 配置数据源信息
#[derive(Debug, Clone)]
pub struct ConfigSourceInfo {
    pub source_type: String,
    pub description: String,
    pub priority: u8,
    pub loaded: bool,
}

/// 配置管理器
pub struct ConfigManager {
    config: Config,
    sources_info: Vec<ConfigSourceInfo>,
}

impl ConfigManager {
    /// 创建配置管理器（仅默认配置源）
    pub fn new() -> Result<Self> {
        Self::with_sources(vec![])
    }

    /// 使用指定的额外配置源创建配置管理器
    ///
    /// 加载顺序（后添加者优先生效）：
    /// development.toml -> default.toml -> production.toml -> 额外配置源 -> 环境变量
    /// 即环境变量优先级最高，development.toml 最低
    pub fn with_sources(extra_sources: Vec<ConfigSource>) -> Result<Self> {
        let mut builder = Config::builder();
        let mut sources_info = Vec::new();

        let file_sources = vec![
            ConfigSource::File {
                path: "config/development.toml".to_string(),
                format: Some(FileFormat::Toml),
                required: false,
            },
            ConfigSource::File {
                path: "config/default.toml".to_string(),
                format: Some(FileFormat::Toml),
                required: false,
            },
            ConfigSource::File {
                path: "config/production.toml".to_string(),
                format: Some(FileFormat::Toml),
                required: false,
            },
        ];
        // 键名本身含下划线，层级分隔用双下划线 / Keys contain underscores,
        // level separation uses a double underscore
        let env_source = ConfigSource::Env {
            prefix: "WARBLE".to_string(),
            separator: "__",
        };

        let mut priority = 1u8;
        for source in file_sources
            .into_iter()
            .chain(extra_sources)
            .chain(std::iter::once(env_source))
        {
            let mut info = source.source_info(priority);
            priority += 1;

            // 可选文件不存在时跳过但保留记录，必需文件不存在则直接报错
            if let ConfigSource::File { path, required, .. } = &source {
                if !std::path::Path::new(path).exists() {
                    if *required {
                        return Err(ConfigError::FileNotFound { path: path.clone() }.into());
                    }
                    sources_info.push(info);
                    continue;
                }
            }

            builder = source.add_to_builder(builder)?;
            info.loaded = true;
            sources_info.push(info);
        }

        let config = builder.build().map_err(|e| anyhow!("构建配置失败: {}", e))?;
        Ok(Self {
            config,
            sources_info,
        })
    }

    /// 获取指定 key 的配置值
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get(key)
            .map_err(|e| anyhow!("获取配置 '{}' 失败: {}", key, e))
    }

    /// 获取指定 key 的配置值，如果不存在返回默认值
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// 安全获取配置值，返回详细错误信息
    pub fn get_safe<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, ConfigError> {
        self.config.get(key).map_err(|e| {
            if e.to_string().contains("not found") {
                ConfigError::KeyNotFound {
                    key: key.to_string(),
                }
            } else {
                ConfigError::TypeConversionError {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    /// 获取字符串配置值
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }
    /// 获取布尔配置值
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// 检查配置项是否存在
    pub fn exists(&self, key: &str) -> bool {
        self.config.get::<serde_json::Value>(key).is_ok()
    }

    /// 验证必需的配置项
    pub fn validate_required_keys(
        &self,
        required_keys: &[&str],
    ) -> std::result::Result<(), ConfigError> {
        for key in required_keys {
            if !self.exists(key) {
                return Err(ConfigError::KeyNotFound {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// 获取所有配置源信息
    pub fn sources_info(&self) -> &[ConfigSourceInfo] {
        &self.sources_info
    }

    /// 打印配置源详细信息
    pub fn print_sources_info(&self) {
        println!("配置源信息:");
        println!("============");
        for (index, info) in self.sources_info.iter().enumerate() {
            let status = if info.loaded {
                "✓ 已加载"
            } else {
                "✗ 未加载"
            };
            println!(
                "{}. {} - {} (优先级: {})",
                index + 1,
                info.source_type,
                status,
                info.priority
            );
            println!("   描述: {}", info.description);
        }
        let loaded = self.sources_info.iter().filter(|info| info.loaded).count();
        println!(
            "统计: 总计 {} 个配置源，成功加载 {} 个",
            self.sources_info.len(),
            loaded
        );
    }
}

/// 配置源类型
pub enum ConfigSource {
    /// 文件配置源
    File {
        path: String,
        format: Option<FileFormat>,
        required: bool,
    },
    /// 环境变量配置源
    Env {
        prefix: String,
        separator: &'static str,
    },
    /// 内存配置源（HashMap）
    Memory(HashMap<String, serde_json::Value>),
    /// 字符串配置源
    String { content: String, format: FileFormat },
}

impl ConfigSource {
    /// 生成配置源描述信息
    fn source_info(&self, priority: u8) -> ConfigSourceInfo {
        match self {
            ConfigSource::File {
                path,
                format,
                required,
            } => {
                let format_str = match format {
                    Some(FileFormat::Toml) => "TOML",
                    Some(FileFormat::Json) => "JSON",
                    Some(_) => "Other",
                    None => "Auto-detect",
                };
                ConfigSourceInfo {
                    source_type: "File".to_string(),
                    description: format!(
                        "文件配置源: {} (格式: {}, 必需: {})",
                        path, format_str, required
                    ),
                    priority,
                    loaded: false,
                }
            }
            ConfigSource::Env { prefix, separator } => ConfigSourceInfo {
                source_type: "Environment".to_string(),
                description: format!("环境变量配置源: 前缀={}, 分隔符={}", prefix, separator),
                priority,
                loaded: false,
            },
            ConfigSource::Memory(map) => ConfigSourceInfo {
                source_type: "Memory".to_string(),
                description: format!("内存配置源: {} 个配置项", map.len()),
                priority,
                loaded: false,
            },
            ConfigSource::String { .. } => ConfigSourceInfo {
                source_type: "String".to_string(),
                description: "字符串配置源".to_string(),
                priority,
                loaded: false,
            },
        }
    }

    fn add_to_builder(
        self,
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<ConfigBuilder<config::builder::DefaultState>> {
        match self {
            ConfigSource::File { path, format, .. } => {
                let file_source = if let Some(format) = format {
                    File::with_name(&path).format(format)
                } else {
                    File::with_name(&path)
                };
                Ok(builder.add_source(file_source))
            }
            ConfigSource::Env { prefix, separator } => Ok(builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator(separator)
                    .prefix_separator("_")
                    .ignore_empty(true),
            )),
            ConfigSource::Memory(map) => {
                let json_content =
                    serde_json::to_string(&map).map_err(|e| anyhow!("序列化内存配置失败: {}", e))?;
                Ok(builder.add_source(File::from_str(&json_content, FileFormat::Json)))
            }
            ConfigSource::String { content, format } => {
                Ok(builder.add_source(File::from_str(&content, format)))
            }
        }
    }
}

/// 使用指定配置文件初始化全局配置管理器（幂等，重复调用返回已有实例）
pub fn init_global_config_with_file(path: &str) -> Result<Arc<ConfigManager>> {
    let mut manager = GLOBAL_CONFIG_MANAGER
        .write()
        .map_err(|e| anyhow!("获取全局配置管理器写锁失败: {}", e))?;
    if let Some(ref existing) = *manager {
        return Ok(Arc::clone(existing));
    }
    let config_manager = Arc::new(ConfigManager::with_sources(vec![ConfigSource::File {
        path: path.to_string(),
        format: Some(FileFormat::Toml),
        required: false,
    }])?);
    *manager = Some(Arc::clone(&config_manager));
    Ok(config_manager)
}

/// 获取全局配置管理器实例（单例模式）
pub fn get_global_config_manager() -> Result<Arc<ConfigManager>> {
    {
        let manager = GLOBAL_CONFIG_MANAGER
            .read()
            .map_err(|e| anyhow!("读取全局配置管理器锁失败: {}", e))?;
        if let Some(ref config_manager) = *manager {
            return Ok(Arc::clone(config_manager));
        }
    }
    let mut manager = GLOBAL_CONFIG_MANAGER
        .write()
        .map_err(|e| anyhow!("获取全局配置管理器写锁失败: {}", e))?;
    if let Some(ref config_manager) = *manager {
        return Ok(Arc::clone(config_manager));
    }
    let config_manager =
        Arc::new(ConfigManager::new().map_err(|e| anyhow!("创建配置管理器失败: {}", e))?);
    *manager = Some(Arc::clone(&config_manager));
    Ok(config_manager)
}

/// 全局配置获取函数（使用单例）
pub fn get_config<T: DeserializeOwned>(key: &str) -> Result<T> {
    let manager = get_global_config_manager()?;
    manager.get(key)
}

/// 安全的全局配置获取函数
pub fn get_config_safe<T: DeserializeOwned>(key: &str) -> std::result::Result<T, ConfigError> {
    let manager = get_global_config_manager().map_err(|e| ConfigError::InitializationError {
        message: e.to_string(),
    })?;
    manager.get_safe(key)
}

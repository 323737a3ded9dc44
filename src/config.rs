//! 配置管理
//!
//! 读取顺序：默认值 → 配置文件（TOML 或 JSON）→ `.env` 与环境变量 → 校验。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HarvestError, HarvestResult};
use crate::extract::{profiles, Profile};

/// 默认配置文件查找路径
pub const CONFIG_PATHS: &[&str] = &["./scrollharvest.toml", "~/.config/scrollharvest/config.toml"];

const DEFAULT_STORE_PATH: &str = "~/.scrollharvest/records.redb";
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:135.0) Gecko/20100101 Firefox/135.0";

/// 采集配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    // 存储
    pub store_path: String,
    pub max_records: usize,

    // 滚动
    pub scroll_step: u32,
    pub scroll_delay_ms: u64,
    pub load_check_delay_ms: u64,
    pub max_retries: u32,
    pub bottom_margin: u64,
    pub bottom_confirmations: u32,
    pub max_cycles: Option<u32>,

    // 下载
    pub user_agent: String,
    pub timeout_secs: u64,
    pub download_delay_ms: u64,

    /// 自定义规则集，与内置规则集同名时覆盖内置
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            store_path: DEFAULT_STORE_PATH.to_string(),
            max_records: 5000,

            scroll_step: 1000,
            scroll_delay_ms: 3000,
            load_check_delay_ms: 1000,
            max_retries: 8,
            bottom_margin: 500,
            bottom_confirmations: 2,
            max_cycles: None,

            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 60,
            download_delay_ms: 1000,

            profiles: BTreeMap::new(),
        }
    }
}

impl CollectorConfig {
    /// 验证配置
    pub fn validate(&self) -> HarvestResult<()> {
        if self.max_records == 0 {
            return Err(HarvestError::Config("存储容量不能为0".to_string()));
        }

        if self.scroll_step == 0 {
            return Err(HarvestError::Config("滚动距离不能为0".to_string()));
        }

        if self.bottom_confirmations == 0 {
            return Err(HarvestError::Config("到底确认次数不能为0".to_string()));
        }

        if self.timeout_secs == 0 {
            return Err(HarvestError::Config("超时时间必须大于0".to_string()));
        }

        if self.store_path.trim().is_empty() {
            return Err(HarvestError::Config("存储路径不能为空".to_string()));
        }

        for (name, profile) in &self.profiles {
            profile.extractor(name)?;
            if profile.storage_key.trim().is_empty() {
                return Err(HarvestError::Config(format!("规则集 {} 缺少存储键", name)));
            }
        }

        Ok(())
    }

    /// 应用环境变量覆盖，无法解析的值只记录警告
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{collector, network, EnvResult, EnvVar};

        fn take<T>(value: Option<EnvResult<T>>) -> Option<T> {
            match value? {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("忽略环境变量: {}", e);
                    None
                }
            }
        }

        if let Some(path) = take(collector::StorePath::lookup()) {
            self.store_path = path;
        }

        if let Some(max) = take(collector::MaxRecords::lookup()) {
            self.max_records = max;
        }

        if let Some(step) = take(collector::ScrollStep::lookup()) {
            self.scroll_step = step;
        }

        if let Some(delay) = take(collector::ScrollDelay::lookup()) {
            self.scroll_delay_ms = delay.as_millis() as u64;
        }

        if let Some(delay) = take(collector::LoadCheckDelay::lookup()) {
            self.load_check_delay_ms = delay.as_millis() as u64;
        }

        if let Some(retries) = take(collector::MaxRetries::lookup()) {
            self.max_retries = retries;
        }

        if let Some(agent) = take(network::UserAgent::lookup()) {
            if !agent.is_empty() {
                self.user_agent = agent;
            }
        }

        if let Some(timeout) = take(network::Timeout::lookup()) {
            self.timeout_secs = timeout.as_secs();
        }
    }

    /// 展开 `~` 之后的存储文件路径
    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store_path).into_owned())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    /// 查找规则集（自定义优先）
    pub fn profile(&self, name: &str) -> HarvestResult<Profile> {
        profiles::resolve(name, &self.profiles)
    }

    /// 全部可用规则集名称
    pub fn profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = profiles::names().iter().map(|n| n.to_string()).collect();
        for name in self.profiles.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 加载配置：显式路径优先，否则按 `CONFIG_PATHS` 查找
    pub fn load(explicit: Option<&Path>) -> HarvestResult<CollectorConfig> {
        Self::load_dotenv();

        let mut config = match explicit {
            Some(path) => {
                info!("加载配置文件: {}", path.display());
                Self::load_from_file(path)?
            }
            None => Self::find_config()?,
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn find_config() -> HarvestResult<CollectorConfig> {
        for path in CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let candidate = Path::new(expanded_path.as_ref());
            if candidate.exists() {
                info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(candidate);
            }
        }

        info!("未找到配置文件，使用默认配置");
        Ok(CollectorConfig::default())
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &Path) -> HarvestResult<CollectorConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HarvestError::Config(format!("读取配置文件失败: {}", e)))?;

        if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .map_err(|e| HarvestError::Config(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| HarvestError::Config(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &Path) -> HarvestResult<()> {
        let config = CollectorConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| HarvestError::Config(format!("序列化配置失败: {}", e)))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
            .map_err(|e| HarvestError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CollectorConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_retries, 8);
        assert_eq!(config.scroll_delay_ms, 3000);
    }

    #[test]
    fn zero_capacity_is_invalid() {
        let config = CollectorConfig {
            max_records: 0,
            ..CollectorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn example_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("scrollharvest.toml");
        ConfigManager::generate_example_config(&path).unwrap();
        let loaded = ConfigManager::load_from_file(&path).unwrap();
        assert_eq!(loaded, CollectorConfig::default());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "max_records = 3\nscroll_step = 400\n").unwrap();
        let loaded = ConfigManager::load_from_file(&path).unwrap();
        assert_eq!(loaded.max_records, 3);
        assert_eq!(loaded.scroll_step, 400);
        assert_eq!(loaded.max_retries, 8);
    }

    #[test]
    fn custom_profile_from_toml() {
        let text = r#"
max_records = 50

[profiles.blog]
storage_key = "BLOG_POSTS"
base_url = "https://blog.example"
container = "main"

[profiles.blog.rules]
item_selector = "article.post"

[profiles.blog.rules.id]
kind = "attribute"
attribute = "data-id"

[profiles.blog.rules.url]
selector = "a.permalink"
attribute = "href"

[[profiles.blog.rules.fields]]
name = "title"
selectors = ["h2"]
fallback = "无标题"
"#;
        let config: CollectorConfig = toml::from_str(text).unwrap();
        config.validate().unwrap();
        let profile = config.profile("blog").unwrap();
        assert_eq!(profile.storage_key, "BLOG_POSTS");
        assert_eq!(profile.rules.fields.len(), 1);
        assert_eq!(profile.container.as_ref().map(|s| s.as_str()), Some("main"));
    }

    #[test]
    fn custom_profile_shadows_builtin() {
        let mut config = CollectorConfig::default();
        let mut custom = profiles::builtin("douyin").unwrap().unwrap();
        custom.storage_key = "MY_DOUYIN".to_string();
        config.profiles.insert("douyin".to_string(), custom);
        config
            .profiles
            .insert("mine".to_string(), profiles::builtin("xhs").unwrap().unwrap());

        assert_eq!(config.profile("douyin").unwrap().storage_key, "MY_DOUYIN");
        assert_eq!(
            config.profile_names(),
            vec!["xhs", "wechat-mp", "jimeng", "douyin", "mine"]
        );
        config.validate().unwrap();
    }
}

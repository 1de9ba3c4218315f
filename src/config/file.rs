use crate::domain::model::{GeoPoint, Location};
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// TOML 設定檔，所有欄位皆可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub traffic: Option<TrafficSection>,
    pub weather: Option<WeatherSection>,
    pub load: Option<LoadSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrafficSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub points: Option<Vec<GeoPoint>>,
    pub zoom: Option<u8>,
    pub timeout_seconds: Option<u64>,
    pub output_folder: Option<String>,
    pub route_distance_meters: Option<f64>,
    pub extra_params: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WeatherSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub output_folder: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub units: Option<String>,
    pub locations: Option<Vec<Location>>,
    pub extra_params: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadSection {
    pub database: Option<String>,
    pub table: Option<String>,
}

fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"))
}

/// 值中仍有未替換的 `${VAR}` 時視為未設定
pub fn is_unresolved(value: &str) -> bool {
    env_var_regex().is_match(value)
}

impl ConfigFile {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        tracing::debug!("Loaded config file {}", path.as_ref().display());
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content, |name| std::env::var(name).ok());

        toml::from_str(&processed).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換 `${VAR}`；找不到的變數保留原文
    pub fn substitute_env_vars(content: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
        env_var_regex()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .into_owned()
    }
}

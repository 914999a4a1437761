use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// CORS 允许的 origins 列表，为空时允许所有来源（开发模式）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    /// 匹配配置文件（别名表等）路径；缺省时使用内置表
    #[serde(default)]
    pub match_config_path: Option<String>,

    #[serde(default)]
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 完整数据库连接 URL。优先级高于 data_dir。
    /// 环境变量 DATABASE_URL 可覆盖。
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            data_dir: default_data_dir(),
        }
    }
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                return url;
            }
        }
        match &self.url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!("sqlite://{}/fedlens.db?mode=rwc", self.data_dir),
        }
    }

    /// 日志用：抹掉 URL 里的账号密码。
    pub fn redacted_url(&self) -> String {
        let url = self.connection_url();
        match url.find("://") {
            Some(scheme_end) => {
                let rest = &url[scheme_end + 3..];
                match rest.find('@') {
                    Some(at) => format!("{}://***@{}", &url[..scheme_end], &rest[at + 1..]),
                    None => url,
                }
            }
            None => url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// 默认每页条数
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// page_size 达到该值视为"返回全部"哨兵
    #[serde(default = "default_all_rows_sentinel")]
    pub all_rows_sentinel: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            all_rows_sentinel: default_all_rows_sentinel(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_page_size() -> u64 {
    25
}

fn default_all_rows_sentinel() -> u64 {
    9999
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

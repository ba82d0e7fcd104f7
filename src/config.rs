//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AGENTDOCK__*` 覆盖（双下划线表示嵌套，如 `AGENTDOCK__LLM__MODEL=llama3-8b-8192`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub dispatch: DispatchSection,
    #[serde(default)]
    pub providers: ProvidersSection,
}

/// [app] 段：应用名、描述符种子文件、审计库路径
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 启动时载入的描述符种子文件（[[agents]] / [[tools]]），未设置则从空仓库启动
    pub descriptors_path: Option<PathBuf>,
    /// 审计记录 SQLite 文件；未设置时审计只保存在内存
    pub audit_db: Option<PathBuf>,
}

/// [llm] 段：OpenAI 兼容端点（默认 Groq）与默认采样参数
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// openai 兼容后端 / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: Option<String>,
    /// 未设置时读取环境变量 GROQ_API_KEY / OPENAI_API_KEY
    pub api_key: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// 单次补全请求的超时（秒）
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "llama3-70b-8192".to_string()
}

fn default_base_url() -> Option<String> {
    Some("https://api.groq.com/openai/v1".to_string())
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_timeout_secs() -> u64 {
    60
}

/// [dispatch] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DispatchSection {
    /// 同一实体 id 同时最多一个在途调用（默认关闭，保持完全交错的并发行为）
    #[serde(default)]
    pub serialize_per_entity: bool,
    /// 执行 LLM 回复中的 [TOOL_ACTION:...] 标记并写入 toolResults
    #[serde(default)]
    pub execute_tool_actions: bool,
}

/// [providers] 段：HTTP 超时与各 Provider 的兜底凭据（描述符 config 未给出时使用）
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersSection {
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub jira: JiraDefaults,
    #[serde(default)]
    pub slack: SlackDefaults,
    #[serde(default)]
    pub github: GithubDefaults,
    #[serde(default)]
    pub shopify: ShopifyDefaults,
}

impl Default for ProvidersSection {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
            jira: JiraDefaults::default(),
            slack: SlackDefaults::default(),
            github: GithubDefaults::default(),
            shopify: ShopifyDefaults::default(),
        }
    }
}

fn default_http_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct JiraDefaults {
    pub host: Option<String>,
    pub username: Option<String>,
    pub api_token: Option<String>,
    pub default_project: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SlackDefaults {
    pub token: Option<String>,
    pub default_channel: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GithubDefaults {
    pub token: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ShopifyDefaults {
    pub shop_name: Option<String>,
    pub access_token: Option<String>,
    pub api_version: Option<String>,
}

/// 从 config 目录加载配置，环境变量 AGENTDOCK__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 AGENTDOCK__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AGENTDOCK")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

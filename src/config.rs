use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{PhoneClawError, PhoneClawResult};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Cn,
    En,
}

impl Lang {
    pub fn as_str(self) -> &'static str {
        match self {
            Lang::Cn => "cn",
            Lang::En => "en",
        }
    }
}

impl FromStr for Lang {
    type Err = PhoneClawError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cn" | "zh" => Ok(Lang::Cn),
            "en" => Ok(Lang::En),
            other => Err(PhoneClawError::Config(format!("unsupported lang '{other}'"))),
        }
    }
}

/// Single: one vision model answers with `do(...)`/`finish(...)`.
/// Two-tier: describer, planner and locator cooperate each step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    #[default]
    Single,
    #[value(name = "two_tier", alias = "two-tier")]
    TwoTier,
}

impl fmt::Display for AgentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentMode::Single => f.write_str("single"),
            AgentMode::TwoTier => f.write_str("two_tier"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub lang: Lang,
    #[serde(default)]
    pub mode: AgentMode,
    /// Number of history entries shown to the planner. Unset means the mode default.
    #[serde(default)]
    pub history_limit: Option<usize>,
    #[serde(default = "default_screenshot_timeout")]
    pub screenshot_timeout_secs: u64,
    /// Limit on any other single adb command.
    #[serde(default = "default_device_timeout")]
    pub device_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub verbose: bool,
    #[serde(default)]
    pub auto_confirm: bool,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            device_id: None,
            lang: Lang::default(),
            mode: AgentMode::default(),
            history_limit: None,
            screenshot_timeout_secs: default_screenshot_timeout(),
            device_timeout_secs: default_device_timeout(),
            verbose: true,
            auto_confirm: false,
        }
    }
}

impl AgentSection {
    /// Unlimited in single mode, the five most recent entries in two-tier mode.
    pub fn effective_history_limit(&self) -> Option<usize> {
        match (self.history_limit, self.mode) {
            (Some(limit), _) => Some(limit),
            (None, AgentMode::Single) => None,
            (None, AgentMode::TwoTier) => Some(5),
        }
    }
}

fn default_max_steps() -> u32 {
    100
}

fn default_screenshot_timeout() -> u64 {
    10
}

fn default_device_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
    /// Role-to-model mapping. Absent roles fall back to `active_provider` defaults.
    #[serde(default)]
    pub roles: RolesConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert(
            "zhipu".to_string(),
            ProviderEntry {
                display_name: "Zhipu AutoGLM".into(),
                api_base: "https://open.bigmodel.cn/api/paas/v4".into(),
                model: "autoglm-phone".into(),
                ..ProviderEntry::default()
            },
        );
        providers.insert(
            "deepseek".to_string(),
            ProviderEntry {
                display_name: "DeepSeek".into(),
                api_base: "https://api.deepseek.com".into(),
                model: "deepseek-chat".into(),
                temperature: 0.7,
                top_p: 0.9,
                max_tokens: 2000,
                frequency_penalty: 0.0,
                ..ProviderEntry::default()
            },
        );
        Self {
            active_provider: "zhipu".into(),
            providers,
            roles: RolesConfig {
                planner: Some(RoleEntry {
                    provider: "deepseek".into(),
                    model: "deepseek-chat".into(),
                    stream: false,
                    temperature: None,
                }),
                ..RolesConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    #[serde(default)]
    pub display_name: String,
    /// Base URL; requests go to `{api_base}/chat/completions`.
    pub api_base: String,
    /// Default model for this provider, used when a role names none.
    pub model: String,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Overridden by `PHONECLAW_<ID>_API_KEY` when that is set.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ProviderEntry {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            api_base: String::new(),
            model: String::new(),
            temperature: 0.0,
            top_p: default_top_p(),
            max_tokens: default_max_tokens(),
            frequency_penalty: default_frequency_penalty(),
            timeout_secs: default_timeout(),
            api_key: None,
        }
    }
}

fn default_top_p() -> f64 {
    0.85
}

fn default_max_tokens() -> u32 {
    3000
}

fn default_frequency_penalty() -> f64 {
    0.2
}

fn default_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RolesConfig {
    /// Single-mode vision model that answers with full action calls.
    pub agent: Option<RoleEntry>,
    /// Text model that picks the next action from a screen description.
    pub planner: Option<RoleEntry>,
    /// Vision model that only returns coordinates. Falls back to `agent`.
    pub locator: Option<RoleEntry>,
    /// Vision model that describes the screen. Falls back to `locator`.
    pub describer: Option<RoleEntry>,
}

impl RolesConfig {
    pub fn entries(&self) -> [(&'static str, Option<&RoleEntry>); 4] {
        [
            ("agent", self.agent.as_ref()),
            ("planner", self.planner.as_ref()),
            ("locator", self.locator.as_ref()),
            ("describer", self.describer.as_ref()),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleEntry {
    /// Must match a key under `[llm.providers.*]`.
    pub provider: String,
    pub model: String,
    #[serde(default = "default_true")]
    pub stream: bool,
    /// Overrides the provider-level temperature for this role.
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a timestamped file.
    #[serde(default)]
    pub file: bool,
    /// Defaults to `logs/` next to the executable.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

/// Explicit path first, then next to the executable, the working directory
/// and `~/.phoneclaw/`. `Ok(None)` when no file exists anywhere.
pub fn resolve_config_path(explicit: Option<&Path>) -> PhoneClawResult<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(PhoneClawError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(Some(candidate));
            }
        }
    }

    let candidate = std::env::current_dir()?.join(CONFIG_FILE_NAME);
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(Some(candidate));
    }

    if let Some(home) = dirs::home_dir() {
        let candidate = home.join(".phoneclaw").join(CONFIG_FILE_NAME);
        if candidate.exists() {
            tracing::debug!(path = %candidate.display(), "config found in home directory");
            return Ok(Some(candidate));
        }
    }

    Ok(None)
}

/// Loads, applies environment overrides and validates.
pub fn load_config(explicit: Option<&Path>) -> PhoneClawResult<AppConfig> {
    let mut config = match resolve_config_path(explicit)? {
        Some(path) => {
            let config = load_config_from(&path)?;
            tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
            config
        }
        None => {
            tracing::info!("no config.toml found, using built-in defaults");
            AppConfig::default()
        }
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

pub fn load_config_from(path: &Path) -> PhoneClawResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

pub fn save_config(config: &AppConfig, path: &Path) -> PhoneClawResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

/// `PHONECLAW_<ID>_API_KEY`, with `-` in the id mapped to `_`.
pub fn api_key_env_var(provider_id: &str) -> String {
    format!(
        "PHONECLAW_{}_API_KEY",
        provider_id.to_uppercase().replace('-', "_")
    )
}

impl AppConfig {
    pub fn apply_env_overrides(&mut self) {
        for (id, entry) in self.llm.providers.iter_mut() {
            if let Ok(key) = std::env::var(api_key_env_var(id)) {
                if !key.is_empty() {
                    entry.api_key = Some(key);
                }
            }
        }
        let device_empty = self.agent.device_id.as_deref().map_or(true, str::is_empty);
        if device_empty {
            if let Ok(id) = std::env::var("PHONECLAW_DEVICE_ID") {
                if !id.is_empty() {
                    self.agent.device_id = Some(id);
                }
            }
        }
    }

    pub fn validate(&self) -> PhoneClawResult<()> {
        for (id, entry) in &self.llm.providers {
            if entry.api_base.trim().is_empty() {
                return Err(PhoneClawError::Config(format!(
                    "provider '{id}' has an empty api_base"
                )));
            }
        }
        for (role, entry) in self.llm.roles.entries() {
            if let Some(entry) = entry {
                if !self.llm.providers.contains_key(&entry.provider) {
                    return Err(PhoneClawError::Config(format!(
                        "role '{role}' references unknown provider '{}'",
                        entry.provider
                    )));
                }
            }
        }
        if self.agent.mode == AgentMode::TwoTier {
            let active_known = self.llm.providers.contains_key(&self.llm.active_provider);
            let roles = &self.llm.roles;
            let planner = roles.planner.is_some() || active_known;
            let locator = roles.locator.is_some() || roles.agent.is_some() || active_known;
            if !planner || !locator {
                return Err(PhoneClawError::Config(
                    "two_tier mode needs resolvable planner and locator roles".into(),
                ));
            }
        }
        Ok(())
    }

    /// TOML rendering with API keys masked, for display.
    pub fn redacted(&self) -> PhoneClawResult<String> {
        let mut copy = self.clone();
        for entry in copy.llm.providers.values_mut() {
            if let Some(key) = entry.api_key.as_mut() {
                *key = mask_api_key(key);
            }
        }
        Ok(toml::to_string_pretty(&copy)?)
    }
}

/// Keeps the first and last four characters; keys of eight or fewer are fully masked.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{}{tail}", "*".repeat(chars.len() - 8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_keys() {
        assert_eq!(mask_api_key("abcd"), "****");
        assert_eq!(mask_api_key("abcdefgh"), "********");
        assert_eq!(mask_api_key("abcd12345678wxyz"), "abcd********wxyz");
    }

    #[test]
    fn minimal_file_gets_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [llm]
            active_provider = "local"

            [llm.providers.local]
            api_base = "http://127.0.0.1:8000/v1"
            model = "autoglm-phone-9b"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.agent.max_steps, 100);
        assert_eq!(cfg.agent.device_timeout_secs, 30);
        assert_eq!(cfg.agent.lang, Lang::Cn);
        assert_eq!(cfg.agent.mode, AgentMode::Single);
        assert_eq!(cfg.agent.effective_history_limit(), None);
        let local = &cfg.llm.providers["local"];
        assert_eq!(local.timeout_secs, 60);
        assert_eq!(local.max_tokens, 3000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn two_tier_history_defaults_to_five() {
        let mut agent = AgentSection {
            mode: AgentMode::TwoTier,
            ..AgentSection::default()
        };
        assert_eq!(agent.effective_history_limit(), Some(5));
        agent.history_limit = Some(2);
        assert_eq!(agent.effective_history_limit(), Some(2));
    }

    #[test]
    fn validate_rejects_bad_providers_and_roles() {
        let mut cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());

        cfg.llm.roles.locator = Some(RoleEntry {
            provider: "missing".into(),
            model: "m".into(),
            stream: true,
            temperature: None,
        });
        assert!(matches!(cfg.validate(), Err(PhoneClawError::Config(_))));

        let mut cfg = AppConfig::default();
        if let Some(p) = cfg.llm.providers.get_mut("zhipu") {
            p.api_base.clear();
        }
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn two_tier_without_any_resolvable_role_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.agent.mode = AgentMode::TwoTier;
        cfg.llm.active_provider = "nowhere".into();
        cfg.llm.roles = RolesConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn redacted_hides_keys() {
        let mut cfg = AppConfig::default();
        if let Some(p) = cfg.llm.providers.get_mut("zhipu") {
            p.api_key = Some("sk-1234567890abcdef".into());
        }
        let text = cfg.redacted().unwrap();
        assert!(!text.contains("sk-1234567890abcdef"));
        assert!(text.contains("sk-1***********cdef"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut cfg = AppConfig::default();
        cfg.agent.max_steps = 7;
        cfg.agent.mode = AgentMode::TwoTier;
        save_config(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.agent.max_steps, 7);
        assert_eq!(loaded.agent.mode, AgentMode::TwoTier);
        assert_eq!(loaded.llm.active_provider, "zhipu");
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(resolve_config_path(Some(&missing)).is_err());
    }

    #[test]
    fn env_var_names() {
        assert_eq!(api_key_env_var("zhipu"), "PHONECLAW_ZHIPU_API_KEY");
        assert_eq!(api_key_env_var("my-llm"), "PHONECLAW_MY_LLM_API_KEY");
    }
}

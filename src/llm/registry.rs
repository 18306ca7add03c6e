use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::config::{LlmConfig, ProviderEntry, RoleEntry};
use crate::errors::{PhoneClawError, PhoneClawResult};
use crate::llm::provider::ModelClient;
use crate::llm::providers::openai_compatible::OpenAiCompatibleClient;
use crate::llm::types::CallConfig;

/// Jobs a model can be given during a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Single-mode model that answers with full action calls.
    Agent,
    Planner,
    Locator,
    Describer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Planner => "planner",
            Role::Locator => "locator",
            Role::Describer => "describer",
        }
    }

    /// Role consulted next when this one has no explicit entry.
    fn fallback(self) -> Option<Role> {
        match self {
            Role::Describer => Some(Role::Locator),
            Role::Locator => Some(Role::Agent),
            Role::Agent | Role::Planner => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves roles to configured providers and builds one client per role.
pub struct ProviderRegistry {
    llm_config: LlmConfig,
    thinking_sink: Option<mpsc::UnboundedSender<String>>,
}

impl ProviderRegistry {
    pub fn from_config(llm_config: &LlmConfig) -> Self {
        Self {
            llm_config: llm_config.clone(),
            thinking_sink: None,
        }
    }

    /// Streamed thinking from every client built afterwards goes to `sink`.
    pub fn with_thinking_sink(mut self, sink: mpsc::UnboundedSender<String>) -> Self {
        self.thinking_sink = Some(sink);
        self
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.llm_config.providers.keys().cloned().collect();
        names.sort();
        names
    }

    fn role_entry(&self, role: Role) -> Option<&RoleEntry> {
        let roles = &self.llm_config.roles;
        match role {
            Role::Agent => roles.agent.as_ref(),
            Role::Planner => roles.planner.as_ref(),
            Role::Locator => roles.locator.as_ref(),
            Role::Describer => roles.describer.as_ref(),
        }
    }

    fn provider(&self, id: &str) -> PhoneClawResult<&ProviderEntry> {
        self.llm_config
            .providers
            .get(id)
            .ok_or_else(|| PhoneClawError::Config(format!("provider '{id}' not configured")))
    }

    /// Provider id and call settings for a role.
    ///
    /// Resolution order:
    /// 1. `[llm.roles.<role>]`
    /// 2. the role's fallback chain (describer → locator → agent)
    /// 3. the active provider with its default model and `stream = true`
    pub fn call_config_for_role(&self, role: Role) -> PhoneClawResult<(String, CallConfig)> {
        let mut current = Some(role);
        while let Some(r) = current {
            if let Some(entry) = self.role_entry(r) {
                let provider = self.provider(&entry.provider).map_err(|_| {
                    PhoneClawError::Config(format!(
                        "Role '{}' references unknown provider '{}'",
                        r, entry.provider
                    ))
                })?;
                let model = if entry.model.is_empty() {
                    provider.model.clone()
                } else {
                    entry.model.clone()
                };
                tracing::debug!(
                    role = %role,
                    via = %r,
                    provider = %entry.provider,
                    model = %model,
                    stream = entry.stream,
                    "resolved role config"
                );
                return Ok((
                    entry.provider.clone(),
                    CallConfig {
                        model,
                        stream: entry.stream,
                        temperature: entry.temperature.unwrap_or(provider.temperature),
                        top_p: provider.top_p,
                        max_tokens: provider.max_tokens,
                        frequency_penalty: provider.frequency_penalty,
                    },
                ));
            }
            current = r.fallback();
        }

        let active = &self.llm_config.active_provider;
        let provider = self.provider(active).map_err(|_| {
            PhoneClawError::Config(format!("Active provider '{active}' not found in config"))
        })?;
        tracing::debug!(
            role = %role,
            provider = %active,
            model = %provider.model,
            "role not configured, using active provider fallback"
        );
        Ok((
            active.clone(),
            CallConfig {
                model: provider.model.clone(),
                stream: true,
                temperature: provider.temperature,
                top_p: provider.top_p,
                max_tokens: provider.max_tokens,
                frequency_penalty: provider.frequency_penalty,
            },
        ))
    }

    pub fn client_for_role(&self, role: Role) -> PhoneClawResult<Arc<dyn ModelClient>> {
        let (provider_id, call) = self.call_config_for_role(role)?;
        let entry = self.provider(&provider_id)?;
        let api_key = entry.api_key.clone().unwrap_or_else(|| "EMPTY".to_string());
        let mut client = OpenAiCompatibleClient::new(
            format!("{provider_id}/{role}"),
            &entry.api_base,
            api_key,
            call,
            Duration::from_secs(entry.timeout_secs),
        )?;
        if let Some(sink) = &self.thinking_sink {
            client = client.with_thinking_sink(sink.clone());
        }
        Ok(Arc::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RolesConfig;

    fn llm() -> LlmConfig {
        let mut cfg = LlmConfig::default();
        cfg.roles = RolesConfig::default();
        cfg
    }

    #[test]
    fn unconfigured_role_uses_active_provider() {
        let reg = ProviderRegistry::from_config(&llm());
        let (id, call) = reg.call_config_for_role(Role::Planner).unwrap();
        assert_eq!(id, "zhipu");
        assert_eq!(call.model, "autoglm-phone");
        assert!(call.stream);
    }

    #[test]
    fn describer_falls_back_through_locator_to_agent() {
        let mut cfg = llm();
        cfg.roles.agent = Some(RoleEntry {
            provider: "deepseek".into(),
            model: "vision-x".into(),
            stream: false,
            temperature: Some(0.3),
        });
        let reg = ProviderRegistry::from_config(&cfg);
        let (id, call) = reg.call_config_for_role(Role::Describer).unwrap();
        assert_eq!(id, "deepseek");
        assert_eq!(call.model, "vision-x");
        assert!(!call.stream);
        assert_eq!(call.temperature, 0.3);

        cfg.roles.locator = Some(RoleEntry {
            provider: "zhipu".into(),
            model: String::new(),
            stream: true,
            temperature: None,
        });
        let reg = ProviderRegistry::from_config(&cfg);
        let (id, call) = reg.call_config_for_role(Role::Describer).unwrap();
        assert_eq!(id, "zhipu");
        assert_eq!(call.model, "autoglm-phone");
    }

    #[test]
    fn planner_does_not_borrow_agent_entry() {
        let mut cfg = llm();
        cfg.roles.agent = Some(RoleEntry {
            provider: "deepseek".into(),
            model: "m".into(),
            stream: true,
            temperature: None,
        });
        let reg = ProviderRegistry::from_config(&cfg);
        assert_eq!(reg.call_config_for_role(Role::Planner).unwrap().0, "zhipu");
    }

    #[test]
    fn unknown_provider_in_role_is_config_error() {
        let mut cfg = llm();
        cfg.roles.planner = Some(RoleEntry {
            provider: "ghost".into(),
            model: "m".into(),
            stream: true,
            temperature: None,
        });
        let reg = ProviderRegistry::from_config(&cfg);
        assert!(matches!(
            reg.call_config_for_role(Role::Planner),
            Err(PhoneClawError::Config(_))
        ));
    }

    #[test]
    fn builds_named_client() {
        let reg = ProviderRegistry::from_config(&LlmConfig::default());
        let client = reg.client_for_role(Role::Planner).unwrap();
        assert_eq!(client.name(), "deepseek/planner");
        assert_eq!(reg.list_names(), vec!["deepseek".to_string(), "zhipu".to_string()]);
    }
}

//! Engine Configuration
//!
//! Connection and container settings for the Argo workflow engine.
//! Defaults target a local development cluster; each value can be
//! overridden through an environment variable.

use once_cell::sync::Lazy;

pub const DEFAULT_NAMESPACE: &str = "argo-helm";
pub const DEFAULT_SERVICE_ACCOUNT: &str = "argo-workflow";
pub const DEFAULT_SERVER_URL: &str = "http://localhost:2746";
pub const DEFAULT_IMAGE: &str = "recipeflow-runner";
pub const DEFAULT_VOLUME_CLAIM: &str = "recipeflow-workflow-pvc";

/// Mount point of the shared workflow volume inside step containers.
pub const DEFAULT_WORKFLOW_ROOT: &str = "/mnt/workflow";

pub const ENV_NAMESPACE: &str = "ARGO_NAMESPACE";
pub const ENV_SERVICE_ACCOUNT: &str = "ARGO_SERVICE_ACCOUNT_NAME";
pub const ENV_SERVER_URL: &str = "ARGO_WORKFLOWS_SERVICE_URL";
pub const ENV_TOKEN: &str = "ARGO_TOKEN";
pub const ENV_IMAGE: &str = "RECIPEFLOW_IMAGE";

/// Process-wide settings, read from the environment on first use.
pub static ENGINE_SETTINGS: Lazy<EngineSettings> = Lazy::new(EngineSettings::from_env);

/// Settings used to render and submit workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub namespace: String,
    pub service_account: String,
    pub server_url: String,
    /// Bearer token for the Argo server, if it requires one
    pub token: Option<String>,
    /// Container image running every step
    pub image: String,
    /// Persistent volume claim shared by all steps
    pub volume_claim: String,
    /// Where the claim is mounted in step containers
    pub mount_path: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            service_account: DEFAULT_SERVICE_ACCOUNT.to_string(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            token: None,
            image: DEFAULT_IMAGE.to_string(),
            volume_claim: DEFAULT_VOLUME_CLAIM.to_string(),
            mount_path: DEFAULT_WORKFLOW_ROOT.to_string(),
        }
    }
}

impl EngineSettings {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        Self {
            namespace: get(ENV_NAMESPACE, defaults.namespace),
            service_account: get(ENV_SERVICE_ACCOUNT, defaults.service_account),
            server_url: get(ENV_SERVER_URL, defaults.server_url)
                .trim_end_matches('/')
                .to_string(),
            token: lookup(ENV_TOKEN).filter(|t| !t.trim().is_empty()),
            image: get(ENV_IMAGE, defaults.image),
            volume_claim: defaults.volume_claim,
            mount_path: defaults.mount_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.namespace, "argo-helm");
        assert_eq!(settings.service_account, "argo-workflow");
        assert_eq!(settings.server_url, "http://localhost:2746");
        assert!(settings.token.is_none());
        assert_eq!(settings.mount_path, DEFAULT_WORKFLOW_ROOT);
    }

    #[test]
    fn test_env_override() {
        let vars: HashMap<&str, &str> = [
            (ENV_NAMESPACE, "argo_namespace_test"),
            (ENV_SERVICE_ACCOUNT, "argo_service_account_name_test"),
            (ENV_SERVER_URL, "https://argo.example.org/"),
            (ENV_TOKEN, "secret"),
        ]
        .into_iter()
        .collect();

        let settings = EngineSettings::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(settings.namespace, "argo_namespace_test");
        assert_eq!(settings.service_account, "argo_service_account_name_test");
        assert_eq!(settings.server_url, "https://argo.example.org");
        assert_eq!(settings.token.as_deref(), Some("secret"));
        assert_eq!(settings.image, DEFAULT_IMAGE);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let settings = EngineSettings::from_lookup(|_| Some("  ".to_string()));
        assert_eq!(settings, EngineSettings::default());
    }
}

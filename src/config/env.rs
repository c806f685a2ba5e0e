//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "CLICKRUN";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Spec directory from CLICKRUN_SPEC_DIR
    pub spec_dir: Option<String>,
    /// Spec prefix from CLICKRUN_PREFIX
    pub prefix: Option<String>,
    /// Generic spec from CLICKRUN_GENERIC (empty disables it)
    pub generic: Option<String>,
    /// Launcher from CLICKRUN_LAUNCHER
    pub launcher: Option<String>,
    /// Process timeout from CLICKRUN_TIMEOUT
    pub timeout: Option<u64>,
    /// Concurrency cap from CLICKRUN_MAX_CONCURRENT
    pub max_concurrent: Option<usize>,
    /// Output ceiling from CLICKRUN_MAX_OUTPUT
    pub max_output: Option<usize>,
    /// Config file from CLICKRUN_CONFIG
    pub config_file: Option<String>,
    /// CLICKRUN_NO_COLOR, or the conventional NO_COLOR
    pub no_color: Option<bool>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        let no_color = get_env_bool("NO_COLOR")
            .or_else(|| env::var_os("NO_COLOR").map(|v| !v.is_empty()));

        Self {
            spec_dir: get_env("SPEC_DIR"),
            prefix: get_env("PREFIX"),
            generic: get_env("GENERIC"),
            launcher: get_env("LAUNCHER"),
            timeout: get_env_parse("TIMEOUT"),
            max_concurrent: get_env_parse("MAX_CONCURRENT"),
            max_output: get_env_parse("MAX_OUTPUT"),
            config_file: get_env("CONFIG"),
            no_color,
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.spec_dir.is_some()
            || self.prefix.is_some()
            || self.generic.is_some()
            || self.launcher.is_some()
            || self.timeout.is_some()
            || self.max_concurrent.is_some()
            || self.max_output.is_some()
            || self.config_file.is_some()
            || self.no_color.is_some()
    }

    /// Override config values with the ones set in the environment
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.spec_dir {
            config.spec_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = &self.prefix {
            config.prefix = prefix.clone();
        }
        if let Some(generic) = &self.generic {
            config.generic_spec = Some(generic.clone()).filter(|g| !g.is_empty());
        }
        if let Some(launcher) = &self.launcher {
            config.launcher = Some(launcher.clone()).filter(|l| !l.is_empty());
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = Some(max);
        }
        if let Some(bytes) = self.max_output {
            config.max_output_bytes = bytes;
        }
        if let Some(no_color) = self.no_color {
            config.color = !no_color;
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_SPEC_DIR:       {:?}", ENV_PREFIX, self.spec_dir);
        println!("  {}_PREFIX:         {:?}", ENV_PREFIX, self.prefix);
        println!("  {}_GENERIC:        {:?}", ENV_PREFIX, self.generic);
        println!("  {}_LAUNCHER:       {:?}", ENV_PREFIX, self.launcher);
        println!("  {}_TIMEOUT:        {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_MAX_CONCURRENT: {:?}", ENV_PREFIX, self.max_concurrent);
        println!("  {}_MAX_OUTPUT:     {:?}", ENV_PREFIX, self.max_output);
        println!("  {}_CONFIG:         {:?}", ENV_PREFIX, self.config_file);
        println!("  NO_COLOR:                {:?}", self.no_color);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.spec_dir.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_env_builder() {
        let _guard = EnvBuilder::new()
            .var("SPEC_DIR", "e2e/specs")
            .var("TIMEOUT", "90")
            .var("MAX_CONCURRENT", "3")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.spec_dir, Some("e2e/specs".to_string()));
        assert_eq!(config.timeout, Some(90));
        assert_eq!(config.max_concurrent, Some(3));
    }

    #[test]
    fn test_env_unparseable_number_is_ignored() {
        let _guard = EnvBuilder::new().var("MAX_OUTPUT", "lots").apply_scoped();

        let config = EnvConfig::load();
        assert!(config.max_output.is_none());
    }

    #[test]
    fn test_apply_overrides() {
        let env = EnvConfig {
            prefix: Some("test.".to_string()),
            generic: Some(String::new()),
            launcher: Some("mocha".to_string()),
            max_concurrent: Some(2),
            no_color: Some(true),
            ..Default::default()
        };
        let mut config = AppConfig::default();
        env.apply(&mut config);

        assert_eq!(config.prefix, "test.");
        assert!(config.generic_spec.is_none());
        assert_eq!(config.launcher.as_deref(), Some("mocha"));
        assert_eq!(config.max_concurrent, Some(2));
        assert!(!config.color);
        assert_eq!(config.timeout_secs, AppConfig::default().timeout_secs);
    }

    #[test]
    fn test_has_any() {
        let with_dir = EnvConfig {
            spec_dir: Some("clicktests".to_string()),
            ..Default::default()
        };
        assert!(with_dir.has_any());
    }
}

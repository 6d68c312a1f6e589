//! Variable interpolation for configuration values.
//!
//! Supports:
//! - `${env.VAR_NAME}` - Environment variable
//! - `${hostname}` - Host name of the machine, when known
//! - `${name}` - Custom variable set by the caller
//!
//! Unknown variables are left in place untouched.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Values available for interpolation.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Custom variables defined by the caller
    pub custom: HashMap<String, String>,
}

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}")
        .expect("variable pattern is valid")
});

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Variables populated from the current process environment.
    pub fn from_process_env() -> Self {
        let mut vars = Self::new();
        vars.env.extend(std::env::vars());
        if let Some(host) = vars.env.get("HOSTNAME").cloned() {
            vars.set("hostname", host);
        }
        vars
    }

    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.insert(key.to_string(), value.into());
        self
    }

    /// Add a custom variable.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.custom.insert(name.to_string(), value.into());
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        match parts.as_slice() {
            ["env", name] => self.env.get(*name).cloned(),
            [name] => self.custom.get(*name).cloned(),
            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }

    /// Names of variables referenced in `input` that cannot be resolved.
    pub fn unresolved(&self, input: &str) -> Vec<String> {
        VAR_REGEX
            .captures_iter(input)
            .map(|caps| caps[1].to_string())
            .filter(|name| self.resolve(name).is_none())
            .collect()
    }
}

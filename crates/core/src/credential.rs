use std::fmt;

/// Where a strategy's secret comes from. Read at call time, never logged.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Name of an environment variable holding the secret.
    Env(String),
    /// Secret supplied directly (tests, embedding callers).
    Static(String),
    None,
}

impl Credential {
    pub fn env(var: impl Into<String>) -> Self {
        Credential::Env(var.into())
    }

    /// Current value, treating an empty or whitespace-only secret as absent.
    pub fn resolve(&self) -> Option<String> {
        let value = match self {
            Credential::Env(var) => std::env::var(var).ok()?,
            Credential::Static(value) => value.clone(),
            Credential::None => return None,
        };
        let value = value.trim().to_string();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }

    pub fn is_present(&self) -> bool {
        self.resolve().is_some()
    }

    /// Human-readable source for "skipped" messages, without the secret.
    pub fn describe(&self) -> String {
        match self {
            Credential::Env(var) => var.clone(),
            Credential::Static(_) => "static credential".to_string(),
            Credential::None => "no credential".to_string(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Env(var) => write!(f, "Credential::Env({var})"),
            Credential::Static(_) => write!(f, "Credential::Static(<redacted>)"),
            Credential::None => write!(f, "Credential::None"),
        }
    }
}

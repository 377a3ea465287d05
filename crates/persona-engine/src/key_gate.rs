use std::env;
use std::fmt;
use std::sync::{Arc, RwLock};

use anyhow::Result;

const ENV_KEYS: [&str; 3] = ["GEMINI_API_KEY", "GOOGLE_API_KEY", "API_KEY"];

/// Shared holder for the credential a generator uses at call time.
///
/// A key chosen through the gate wins over environment variables.
#[derive(Clone)]
pub struct CredentialSlot {
    selected: Arc<RwLock<Option<String>>>,
    read_env: bool,
}

impl Default for CredentialSlot {
    fn default() -> Self {
        Self {
            selected: Arc::new(RwLock::new(None)),
            read_env: true,
        }
    }
}

impl CredentialSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_environment() -> Self {
        Self {
            read_env: false,
            ..Self::default()
        }
    }

    pub fn select(&self, key: impl Into<String>) {
        let key = key.into().trim().to_string();
        if let Ok(mut slot) = self.selected.write() {
            *slot = Some(key).filter(|value| !value.is_empty());
        }
    }

    pub fn resolve(&self) -> Option<String> {
        let selected = self
            .selected
            .read()
            .ok()
            .and_then(|slot| slot.clone());
        if selected.is_some() || !self.read_env {
            return selected;
        }
        ENV_KEYS.iter().find_map(|key| non_empty_env(key))
    }

    pub fn has_key(&self) -> bool {
        self.resolve().is_some()
    }
}

impl fmt::Debug for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSlot")
            .field("has_key", &self.has_key())
            .field("read_env", &self.read_env)
            .finish()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Key picker supplied by whatever hosts the studio.
pub trait HostKeyCapability: Send + Sync {
    fn has_selected_key(&self) -> Result<bool>;
    /// Returns once the user has chosen a key.
    fn open_select_key(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyGateCheck {
    Selected,
    NotSelected,
    /// No host integration; treated as usable.
    HostAbsent,
    /// The host query failed; treated as usable and not surfaced.
    HostUnavailable(String),
}

impl KeyGateCheck {
    pub fn is_usable(&self) -> bool {
        !matches!(self, Self::NotSelected)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::NotSelected => "not_selected",
            Self::HostAbsent => "host_absent",
            Self::HostUnavailable(_) => "host_unavailable",
        }
    }
}

/// Blocks generation-capable views until a credential is usable. Once usable
/// it stays usable for the rest of the session.
pub struct KeyGate {
    host: Option<Box<dyn HostKeyCapability>>,
    usable: bool,
    checked: Option<KeyGateCheck>,
}

impl KeyGate {
    pub fn new(host: Option<Box<dyn HostKeyCapability>>) -> Self {
        Self {
            host,
            usable: false,
            checked: None,
        }
    }

    pub fn permissive() -> Self {
        Self::new(None)
    }

    /// Runs the startup check once; later calls return the first outcome.
    pub fn check(&mut self) -> KeyGateCheck {
        if let Some(existing) = self.checked.as_ref() {
            return existing.clone();
        }
        let outcome = match self.host.as_ref() {
            None => KeyGateCheck::HostAbsent,
            Some(host) => match host.has_selected_key() {
                Ok(true) => KeyGateCheck::Selected,
                Ok(false) => KeyGateCheck::NotSelected,
                Err(err) => KeyGateCheck::HostUnavailable(format!("{err:#}")),
            },
        };
        if outcome.is_usable() {
            self.usable = true;
        }
        self.checked = Some(outcome.clone());
        outcome
    }

    pub fn request_selection(&mut self) -> Result<bool> {
        if let Some(host) = self.host.as_ref() {
            host.open_select_key()?;
            self.usable = true;
        }
        Ok(self.usable)
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }
}

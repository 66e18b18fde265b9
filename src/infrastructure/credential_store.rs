use crate::infrastructure::error::InfraError;

pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &str) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<String>, InfraError>;
    fn delete_token(&self) -> Result<(), InfraError>;
}

/// API token kept in the platform credential manager.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("toggl-autofill.api-token", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_token(&self, token: &str) -> Result<(), InfraError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(InfraError::Credential("api token must not be empty".to_string()));
        }
        self.entry()?
            .set_password(token)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn load_token(&self) -> Result<Option<String>, InfraError> {
        match self.entry()?.get_password() {
            Ok(value) if value.trim().is_empty() => Ok(None),
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        match self.entry()?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

/// Process-local token slot for tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: std::sync::Mutex<Option<String>>,
}

#[cfg(test)]
impl InMemoryCredentialStore {
    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, InfraError> {
        self.token
            .lock()
            .map_err(|_| InfraError::Credential("token slot poisoned".to_string()))
    }
}

#[cfg(test)]
impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &str) -> Result<(), InfraError> {
        self.slot()?.replace(token.trim().to_string());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<String>, InfraError> {
        Ok(self.slot()?.clone())
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        self.slot()?.take();
        Ok(())
    }
}

/// Fills in the token from `store` when the environment and config file had none.
pub fn resolve_token(
    configured: &str,
    store: &dyn CredentialStore,
) -> Result<Option<String>, InfraError> {
    let configured = configured.trim();
    if !configured.is_empty() && configured != crate::infrastructure::config::PLACEHOLDER_TOKEN {
        return Ok(Some(configured.to_string()));
    }
    store.load_token()
}

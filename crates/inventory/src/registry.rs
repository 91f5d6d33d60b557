//! Provider connection state.
//!
//! [`ProviderRegistry`] holds one [`ProviderAccount`] per known provider
//! behind a single lock. Every read returns a copy, so callers never hold the
//! lock across I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use skywatch_core::error::RegistryError;
use skywatch_core::types::{Credentials, ProviderAccount, ProviderId};

/// Connection state and credentials for every known provider.
#[derive(Debug)]
pub struct ProviderRegistry {
    accounts: Mutex<BTreeMap<ProviderId, ProviderAccount>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// Registry with every provider in [`ProviderId::ALL`], all disconnected.
    pub fn new() -> Self {
        Self::with_providers(ProviderId::ALL)
    }

    /// Registry that only knows the given providers.
    pub fn with_providers(ids: impl IntoIterator<Item = ProviderId>) -> Self {
        let accounts = ids
            .into_iter()
            .map(|id| (id, ProviderAccount::disconnected(id)))
            .collect();
        Self {
            accounts: Mutex::new(accounts),
        }
    }

    /// Copy of one account.
    pub fn get(&self, id: ProviderId) -> Result<ProviderAccount, RegistryError> {
        self.accounts
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Store credentials and mark the provider connected.
    ///
    /// Clears `last_synced`: the new credentials have not been scanned yet.
    pub fn set_connected(
        &self,
        id: ProviderId,
        credentials: Credentials,
    ) -> Result<ProviderAccount, RegistryError> {
        if credentials.is_empty() {
            return Err(RegistryError::InvalidCredentials {
                provider: id.to_string(),
                reason: "credential bundle is empty".to_owned(),
            });
        }

        let mut accounts = self.accounts.lock();
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        account.is_connected = true;
        account.last_synced = None;
        account.credentials = Some(credentials);
        account.generation += 1;
        let snapshot = account.clone();
        drop(accounts);

        info!(provider = %id, "provider connected");
        Ok(snapshot)
    }

    /// Forget credentials and mark the provider disconnected. Idempotent.
    pub fn set_disconnected(&self, id: ProviderId) -> Result<ProviderAccount, RegistryError> {
        let mut accounts = self.accounts.lock();
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let was_connected = account.is_connected;
        account.is_connected = false;
        account.credentials = None;
        if was_connected {
            account.generation += 1;
        }
        let snapshot = account.clone();
        drop(accounts);

        if was_connected {
            info!(provider = %id, "provider disconnected");
        } else {
            debug!(provider = %id, "provider already disconnected");
        }
        Ok(snapshot)
    }

    /// Connected accounts, credentials included, in provider order.
    pub fn list_connected(&self) -> Vec<ProviderAccount> {
        self.accounts
            .lock()
            .values()
            .filter(|a| a.is_connected)
            .cloned()
            .collect()
    }

    /// Every known account.
    pub fn list(&self) -> Vec<ProviderAccount> {
        self.accounts.lock().values().cloned().collect()
    }

    /// Record a completed sync of the connection identified by `generation`.
    /// Returns false, changing nothing, if the provider was disconnected or
    /// reconnected since that generation was read.
    pub fn mark_synced(&self, id: ProviderId, generation: u64, at: DateTime<Utc>) -> bool {
        let mut accounts = self.accounts.lock();
        match accounts.get_mut(&id) {
            Some(account) if account.is_connected && account.generation == generation => {
                account.last_synced = Some(at);
                true
            }
            _ => false,
        }
    }
}

// The `credential_store` module owns the Gmail credential for the lifetime of the process.

use super::google_auth::{AuthError, GConf, GMAIL_SCOPES, GmailHubType, gmail_auth, remove_token_file};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Supplies a valid Gmail credential on demand.
///
/// The first successful authentication is cached; later calls reuse the hub,
/// whose authenticator refreshes expired tokens silently and falls back to
/// the consent flow when a refresh is rejected. [`CredentialStore::invalidate`]
/// deletes the token file and drops the cached hub, so the next call starts
/// over with interactive consent.
///
/// Share it behind an `Arc` between the gateway and whoever drives it.
pub struct CredentialStore {
    gconf: GConf,
    hub: Mutex<Option<GmailHubType>>,
}

impl CredentialStore {
    pub fn new(gconf: GConf) -> Self {
        Self {
            gconf,
            hub: Mutex::new(None),
        }
    }

    /// Returns the authenticated hub, authenticating first if needed.
    pub async fn get_valid_credential(&self) -> Result<GmailHubType, AuthError> {
        let mut hub_guard = self.hub.lock().await;
        if let Some(hub) = hub_guard.as_ref() {
            debug!("Reusing cached Gmail credential");
            return Ok(hub.clone());
        }

        let hub = gmail_auth(&self.gconf, &GMAIL_SCOPES).await?;
        *hub_guard = Some(hub.clone());

        Ok(hub)
    }

    /// Forgets the credential in memory and on disk.
    pub async fn invalidate(&self) {
        self.hub.lock().await.take();
        remove_token_file(self.gconf.token_path()).await;
        info!("Gmail credential invalidated, next use re-authenticates");
    }

    /// Whether a token file exists. It may still be expired or revoked.
    pub fn is_authenticated(&self) -> bool {
        self.gconf.token_path().exists()
    }
}

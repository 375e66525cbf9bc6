// The `token_file` module persists OAuth tokens without letting a failed write abort authentication.

use async_trait::async_trait;
use google_gmail1::yup_oauth2::storage::{TokenInfo, TokenStorage};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    scopes: Vec<String>,
    token: TokenInfo,
}

/// Token storage backed by a JSON file, in the layout yup-oauth2 writes itself.
///
/// Tokens live in memory first. A write that fails is logged and the
/// in-memory token keeps serving, so the current process stays authenticated.
pub struct TokenFile {
    path: PathBuf,
    tokens: Mutex<Vec<StoredToken>>,
}

impl TokenFile {
    /// Loads `path`. A missing file is an empty store; an unreadable or
    /// malformed one is an error.
    pub async fn load(path: &Path) -> io::Result<Self> {
        let tokens = match tokio::fs::read(path).await {
            Ok(contents) => serde_json::from_slice(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(Self {
            path: path.to_path_buf(),
            tokens: Mutex::new(tokens),
        })
    }

    async fn persist(&self, tokens: &[StoredToken]) -> io::Result<()> {
        let json = serde_json::to_vec(tokens).map_err(io::Error::other)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await
    }
}

#[async_trait]
impl TokenStorage for TokenFile {
    async fn set(&self, scopes: &[&str], token: TokenInfo) -> anyhow::Result<()> {
        let mut tokens = self.tokens.lock().await;
        match tokens.iter_mut().find(|t| same_scopes(&t.scopes, scopes)) {
            Some(stored) => stored.token = token,
            None => tokens.push(StoredToken {
                scopes: scopes.iter().map(|s| s.to_string()).collect(),
                token,
            }),
        }

        match self.persist(&tokens).await {
            Ok(()) => debug!(path = %self.path.display(), "Stored credentials"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to store credentials, keeping them in memory only"
            ),
        }
        Ok(())
    }

    async fn get(&self, scopes: &[&str]) -> Option<TokenInfo> {
        let tokens = self.tokens.lock().await;
        tokens
            .iter()
            .find(|t| scopes.iter().all(|s| t.scopes.iter().any(|have| have == s)))
            .map(|t| t.token.clone())
    }
}

fn same_scopes(stored: &[String], scopes: &[&str]) -> bool {
    stored.len() == scopes.len() && scopes.iter().all(|s| stored.iter().any(|have| have == s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SEND: &str = "https://www.googleapis.com/auth/gmail.send";
    const READ: &str = "https://www.googleapis.com/auth/gmail.readonly";

    fn token(access: &str) -> TokenInfo {
        TokenInfo {
            access_token: Some(access.to_string()),
            refresh_token: Some("refresh".to_string()),
            expires_at: None,
            id_token: None,
        }
    }

    #[tokio::test]
    async fn stored_token_survives_a_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");

        let store = TokenFile::load(&path).await.unwrap();
        store.set(&[READ, SEND], token("a1")).await.unwrap();

        let reloaded = TokenFile::load(&path).await.unwrap();
        assert_eq!(reloaded.get(&[READ, SEND]).await, Some(token("a1")));
        assert_eq!(reloaded.get(&[SEND]).await, Some(token("a1")));
    }

    #[tokio::test]
    async fn same_scopes_replace_the_token() {
        let dir = tempdir().unwrap();
        let store = TokenFile::load(&dir.path().join("token.json")).await.unwrap();

        store.set(&[READ], token("old")).await.unwrap();
        store.set(&[READ], token("new")).await.unwrap();

        assert_eq!(store.tokens.lock().await.len(), 1);
        assert_eq!(store.get(&[READ]).await, Some(token("new")));
        assert_eq!(store.get(&[SEND]).await, None);
    }

    #[tokio::test]
    async fn unwritable_path_keeps_the_token_in_memory() {
        let dir = tempdir().unwrap();
        // A regular file where a directory is expected makes every write fail.
        let blocker = dir.path().join("not-a-dir");
        tokio::fs::write(&blocker, b"").await.unwrap();
        let path = blocker.join("token.json");

        let store = TokenFile::load(&path).await.unwrap();
        store.set(&[READ, SEND], token("a1")).await.unwrap();

        assert_eq!(store.get(&[READ, SEND]).await, Some(token("a1")));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let err = TokenFile::load(&path).await.err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

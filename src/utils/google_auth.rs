// The `google_auth` module runs the installed-app OAuth flow and builds the Gmail hub.

use google_gmail1::{
    Gmail,
    api::Scope,
    yup_oauth2::{
        self, InstalledFlowAuthenticator, InstalledFlowReturnMethod,
        authenticator_delegate::InstalledFlowDelegate,
    },
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{client::legacy::Client, client::legacy::connect::HttpConnector, rt::TokioExecutor};
use rustls::crypto::{CryptoProvider, ring::default_provider};
use super::token_file::TokenFile;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A type alias for the HTTPS connector.
pub type HttpsConnectorType = HttpsConnector<HttpConnector>;
/// A type alias for the authenticator.
pub type AuthType = yup_oauth2::authenticator::Authenticator<HttpsConnectorType>;
/// A type alias for the Gmail hub.
pub type GmailHubType = Gmail<HttpsConnectorType>;

/// Scopes the responder needs: read, send and relabel messages.
pub const GMAIL_SCOPES: [Scope; 3] = [Scope::Readonly, Scope::Send, Scope::Modify];

/// How many times a token file that fails to load is discarded before giving up.
pub const MAX_AUTH_ATTEMPTS: usize = 2;

/// The `AuthError` enum defines the possible errors that can occur during authentication.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The client registration file does not exist. The operator has to supply it.
    #[error("Missing client registration file {0}")]
    MissingClientSecret(PathBuf),
    /// The client registration file exists but could not be read.
    #[error("Invalid client registration file: {0}")]
    InvalidClientSecret(std::io::Error),
    /// The authenticator could not be built from the token file.
    #[error("Failed to load stored credentials: {0}")]
    TokenStorage(std::io::Error),
    /// The consent or refresh flow did not yield a token.
    #[error("Failed to obtain an access token: {0}")]
    Token(String),
    /// The TLS connector could not be configured.
    #[error("TLS setup failed: {0}")]
    Tls(std::io::Error),
}

impl AuthError {
    /// Configuration errors cannot be fixed by retrying; everything else can.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AuthError::MissingClientSecret(_) | AuthError::InvalidClientSecret(_)
        )
    }
}

/// The `GConf` struct holds the configuration for Google authentication.
#[derive(Clone, Debug)]
pub struct GConf(Arc<InnerConf>);

/// The inner configuration for `GConf`.
#[derive(Clone, Debug)]
pub struct InnerConf {
    /// The path to the client registration file.
    pub credentials_path: PathBuf,
    /// The path to the persisted token file.
    pub token_path: PathBuf,
}

impl GConf {
    /// Creates a new `GConf`.
    pub fn new(credentials_path: PathBuf, token_path: PathBuf) -> GConf {
        GConf(Arc::new(InnerConf {
            credentials_path,
            token_path,
        }))
    }

    pub fn credentials_path(&self) -> &Path {
        &self.0.credentials_path
    }

    pub fn token_path(&self) -> &Path {
        &self.0.token_path
    }
}

/// Presents the consent URL to the operator: logs it and tries to open a browser.
pub struct BrowserDelegate;

impl InstalledFlowDelegate for BrowserDelegate {
    fn present_user_url<'a>(
        &'a self,
        url: &'a str,
        need_code: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>> {
        Box::pin(async move {
            info!(%url, "Please authorize access to your Gmail account");
            if let Err(e) = webbrowser::open(url) {
                warn!(error = %e, "Could not open a browser, open the URL manually");
            }
            if need_code {
                Err("interactive code entry is not supported, use the redirect flow".to_string())
            } else {
                Ok(String::new())
            }
        })
    }
}

/// Authenticates with the Gmail API and returns a `GmailHubType`.
///
/// The client registration file is checked before anything touches the
/// network. A token file that cannot be loaded is deleted and the
/// authenticator rebuilt, at most [`MAX_AUTH_ATTEMPTS`] times.
pub async fn gmail_auth(conf: &GConf, scopes: &[Scope]) -> Result<GmailHubType, AuthError> {
    let credentials_path = conf.credentials_path();
    if !credentials_path.exists() {
        return Err(AuthError::MissingClientSecret(credentials_path.to_path_buf()));
    }

    info!("Authenticating with Gmail API");
    let secret = yup_oauth2::read_application_secret(credentials_path)
        .await
        .map_err(AuthError::InvalidClientSecret)?;

    let auth = build_authenticator(secret, conf.token_path()).await?;

    // Loads, refreshes or runs the consent flow as needed.
    auth.token(scopes)
        .await
        .map_err(|e| AuthError::Token(e.to_string()))?;

    _ = CryptoProvider::install_default(default_provider());

    let https = HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(AuthError::Tls)?
        .https_or_http()
        .enable_http1()
        .build();

    let client = Client::builder(TokioExecutor::new()).build(https);

    let hub = Gmail::new(client, auth);
    info!("Successfully authenticated with Gmail API");
    Ok(hub)
}

async fn build_authenticator(
    secret: yup_oauth2::ApplicationSecret,
    token_path: &Path,
) -> Result<AuthType, AuthError> {
    let mut last_error = None;

    for attempt in 1..=MAX_AUTH_ATTEMPTS {
        let storage = match TokenFile::load(token_path).await {
            Ok(storage) => storage,
            Err(e) => {
                warn!(attempt, error = %e, path = %token_path.display(), "Stored credentials unreadable, discarding them");
                remove_token_file(token_path).await;
                last_error = Some(e);
                continue;
            }
        };

        let built = InstalledFlowAuthenticator::builder(
            secret.clone(),
            InstalledFlowReturnMethod::HTTPRedirect,
        )
        .with_storage(Box::new(storage))
        .flow_delegate(Box::new(BrowserDelegate))
        .build()
        .await;

        match built {
            Ok(auth) => return Ok(auth),
            Err(e) => {
                warn!(attempt, error = %e, "Failed to build authenticator");
                last_error = Some(e);
            }
        }
    }

    Err(AuthError::TokenStorage(last_error.unwrap_or_else(|| {
        std::io::Error::other("authenticator was never built")
    })))
}

/// Deletes the token file, logging instead of failing.
pub async fn remove_token_file(token_path: &Path) -> bool {
    match tokio::fs::remove_file(token_path).await {
        Ok(()) => {
            info!(path = %token_path.display(), "Removed stored credentials");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %token_path.display(), error = %e, "Failed to remove stored credentials");
            false
        }
    }
}

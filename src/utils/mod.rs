// The `utils` module provides the authentication and templating plumbing of the responder.

pub mod credential_store;
pub mod google_auth;
pub mod template;
pub mod token_file;

pub use crate::utils::credential_store::CredentialStore;
pub use crate::utils::template::{PromptTemplate, TemplateError};

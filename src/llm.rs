// The `llm` module abstracts the generative model behind the response generator.

pub mod adapters;
pub mod config;
pub mod core;
pub mod decorators;
pub mod factory;

pub use self::config::{RetryConfig, RetryStrategy};
pub use self::core::{LanguageModel, ModelError};
pub use self::decorators::RetryingModel;
pub use self::factory::ModelFactory;

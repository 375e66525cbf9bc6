/// Decorators that wrap a [`LanguageModel`](crate::llm::LanguageModel) and
/// implement the trait themselves, adding behaviour transparently.
pub mod retry;

pub use retry::RetryingModel;

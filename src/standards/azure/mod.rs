//! Azure OpenAI (chat completions) standard.

mod stream;

pub use stream::{AzureOpenAiEventConverter, map_finish_reason};

pub mod completion;
pub mod token_counter;

pub use completion::{CompletionClient, CompletionError};
pub use token_counter::TokenCounter;

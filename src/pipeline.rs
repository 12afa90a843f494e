pub mod batch;
pub mod coding;
pub mod parse;
pub mod prompt;
pub mod summary;

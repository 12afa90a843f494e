pub mod dao;
#[cfg(test)]
pub(crate) mod mock;
pub mod models;

pub use dao::{CommentStore, PgCommentStore, connect_pool};

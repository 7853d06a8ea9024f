pub mod cookies;
pub mod dropbox;
pub mod error;
pub mod probe;
pub mod token_store;
pub mod tokens;
pub mod videos;

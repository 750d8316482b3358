pub mod tokens;

pub use tokens::{IssuedToken, MemoryTokenStore, TokenStore};

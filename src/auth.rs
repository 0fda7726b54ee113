//! OAuth client-assertion signing, token secrets, and the in-memory token cache.

pub mod jwt;
pub mod secret;
pub mod token;

pub use jwt::*;
pub use secret::*;
pub use token::*;

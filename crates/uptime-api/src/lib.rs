//! Users, tokens and checks: the services behind the JSON API, and the thin
//! axum layer that exposes them.

pub mod checks;
pub mod error;
pub mod middleware;
mod password;
pub mod resolver;
pub mod routes;
pub mod state;
pub mod tokens;
pub mod users;

#[cfg(test)]
mod testing;

pub use checks::{CheckRegistry, DEFAULT_MAX_CHECKS};
pub use error::ApiError;
pub use resolver::{HostResolver, SystemResolver};
pub use state::{AppState, AppStateInner};
pub use tokens::TokenAuthorizer;
pub use users::UserService;

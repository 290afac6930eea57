use std::sync::Arc;

use uptime_store::RecordStore;

use crate::checks::CheckRegistry;
use crate::resolver::HostResolver;
use crate::tokens::TokenAuthorizer;
use crate::users::UserService;

pub type AppState = Arc<AppStateInner>;

/// Services shared by every request handler.
pub struct AppStateInner {
    pub tokens: Arc<TokenAuthorizer>,
    pub users: UserService,
    pub checks: CheckRegistry,
}

impl AppStateInner {
    /// Wire the services over one record store.
    pub fn new(store: Arc<RecordStore>, resolver: Arc<dyn HostResolver>, max_checks: usize) -> Self {
        let tokens = Arc::new(TokenAuthorizer::new(store.clone()));
        Self {
            users: UserService::new(store.clone(), tokens.clone()),
            checks: CheckRegistry::new(store, tokens.clone(), resolver, max_checks),
            tokens,
        }
    }
}

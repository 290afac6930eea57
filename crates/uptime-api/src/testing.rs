use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use uptime_store::RecordStore;
use uptime_types::api::{CheckSpec, NewUser};
use uptime_types::{Check, HttpMethod, Protocol};

use crate::checks::DEFAULT_MAX_CHECKS;
use crate::resolver::HostResolver;
use crate::state::{AppState, AppStateInner};

/// Resolves every host except those under `.invalid`.
pub struct StaticResolver;

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolves(&self, host: &str) -> bool {
        !host.ends_with(".invalid")
    }
}

/// Services over a throwaway record store.
pub struct Harness {
    _tmp: TempDir,
    pub store: Arc<RecordStore>,
    state: AppState,
}

impl Harness {
    pub async fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::new(tmp.path().join("data")).await.unwrap());
        let state = Arc::new(AppStateInner::new(
            store.clone(),
            Arc::new(StaticResolver),
            DEFAULT_MAX_CHECKS,
        ));
        Self {
            _tmp: tmp,
            store,
            state,
        }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    pub async fn register(&self, phone: &str, password: &str) {
        self.users
            .create(NewUser {
                firstname: "Test".into(),
                lastname: "Tester".into(),
                phone: phone.into(),
                password: password.into(),
                tos_agreement: true,
            })
            .await
            .unwrap();
    }

    /// Register `phone` and return a fresh token id for it.
    pub async fn login(&self, phone: &str) -> String {
        self.register(phone, "secret").await;
        self.tokens.issue(phone, "secret").await.unwrap().id
    }

    pub async fn add_check(&self, phone: &str, token: &str) -> Check {
        let owner = self.tokens.owner(token).await.unwrap();
        assert_eq!(owner, phone);
        self.checks.create(phone, spec("example.com/health")).await.unwrap()
    }
}

impl Deref for Harness {
    type Target = AppStateInner;

    fn deref(&self) -> &AppStateInner {
        &self.state
    }
}

pub fn spec(url: &str) -> CheckSpec {
    CheckSpec {
        protocol: Protocol::Https,
        url: url.into(),
        method: HttpMethod::Get,
        success_codes: vec![200],
        timeout_seconds: 3,
    }
}

use std::sync::Arc;

use tracing::{info, warn};

use uptime_store::{Collection, RecordStore, StoreError};
use uptime_types::api::{CheckSpec, CheckUpdate};
use uptime_types::{Check, CheckState, User, ids, validate};

use crate::error::ApiError;
use crate::resolver::HostResolver;
use crate::tokens::TokenAuthorizer;

pub const DEFAULT_MAX_CHECKS: usize = 5;

/// Create, read, edit and remove the checks a user owns.
pub struct CheckRegistry {
    store: Arc<RecordStore>,
    tokens: Arc<TokenAuthorizer>,
    resolver: Arc<dyn HostResolver>,
    max_checks: usize,
}

impl CheckRegistry {
    pub fn new(
        store: Arc<RecordStore>,
        tokens: Arc<TokenAuthorizer>,
        resolver: Arc<dyn HostResolver>,
        max_checks: usize,
    ) -> Self {
        Self {
            store,
            tokens,
            resolver,
            max_checks,
        }
    }

    pub fn max_checks(&self) -> usize {
        self.max_checks
    }

    /// Store a new check for `user_phone` and add it to the user's list.
    ///
    /// The check record is written first. If the user's list cannot take the
    /// new id the record is removed again before the error is returned.
    pub async fn create(&self, user_phone: &str, spec: CheckSpec) -> Result<Check, ApiError> {
        let user_phone = validate::phone(user_phone)?;
        validate::success_codes(&spec.success_codes)?;
        validate::timeout_seconds(spec.timeout_seconds)?;
        let target = validate::target(spec.protocol, &spec.url)?;

        let user: User = self.store.read(Collection::Users, &user_phone).await?;
        if user.checks.len() >= self.max_checks {
            return Err(self.quota_error());
        }

        let host = target.host_str().unwrap_or_default();
        if !self.resolver.resolves(host).await {
            return Err(ApiError::Validation(
                "The hostname of the URL entered did not resolve to any DNS entries".into(),
            ));
        }

        let check = Check {
            id: ids::random_id(),
            user_phone: user_phone.clone(),
            protocol: spec.protocol,
            url: spec.url.trim().to_string(),
            method: spec.method,
            success_codes: spec.success_codes,
            timeout_seconds: spec.timeout_seconds,
            state: CheckState::Down,
            last_checked: None,
        };
        self.store.create(Collection::Checks, &check.id, &check).await?;

        let linked = self
            .store
            .modify(Collection::Users, &user_phone, |user: &mut User| {
                // Re-check under the user's lock; a concurrent create may have won.
                if user.checks.len() >= self.max_checks {
                    return Err(self.quota_error());
                }
                user.checks.push(check.id.clone());
                Ok(())
            })
            .await;
        if let Err(e) = linked {
            if let Err(undo) = self.store.delete(Collection::Checks, &check.id).await {
                warn!(check_id = %check.id, error = %undo, "Could not remove unlinked check");
            }
            return Err(e);
        }

        info!(check_id = %check.id, phone = %user_phone, target = %check.describe(), "Check created");
        Ok(check)
    }

    pub async fn get(&self, id: &str, token: &str) -> Result<Check, ApiError> {
        let id = check_id(id)?;
        let check: Check = self.store.read(Collection::Checks, id).await?;
        self.tokens.authorize(token, &check.user_phone).await?;
        Ok(check)
    }

    /// Merge the supplied fields into a check the token's owner holds.
    pub async fn update(&self, id: &str, token: &str, fields: CheckUpdate) -> Result<Check, ApiError> {
        let id = check_id(id)?;
        if fields.is_empty() {
            return Err(ApiError::Validation("Missing fields to update".into()));
        }
        if let Some(codes) = &fields.success_codes {
            validate::success_codes(codes)?;
        }
        if let Some(secs) = fields.timeout_seconds {
            validate::timeout_seconds(secs)?;
        }

        let current: Check = self.store.read(Collection::Checks, id).await?;
        self.tokens.authorize(token, &current.user_phone).await?;

        let check = self
            .store
            .modify(Collection::Checks, id, |check: &mut Check| {
                let mut merged = check.clone();
                if let Some(protocol) = fields.protocol {
                    merged.protocol = protocol;
                }
                if let Some(url) = fields.url {
                    merged.url = url.trim().to_string();
                }
                if let Some(method) = fields.method {
                    merged.method = method;
                }
                if let Some(codes) = fields.success_codes {
                    merged.success_codes = codes;
                }
                if let Some(secs) = fields.timeout_seconds {
                    merged.timeout_seconds = secs;
                }
                merged.target()?;
                *check = merged;
                Ok::<_, ApiError>(check.clone())
            })
            .await?;
        info!(check_id = %check.id, "Check updated");
        Ok(check)
    }

    /// Remove a check and drop its id from the owner's list.
    pub async fn delete(&self, id: &str, token: &str) -> Result<(), ApiError> {
        let id = check_id(id)?;
        let check: Check = self.store.read(Collection::Checks, id).await?;
        self.tokens.authorize(token, &check.user_phone).await?;

        self.store.delete(Collection::Checks, id).await?;
        let unlinked = self
            .store
            .modify(Collection::Users, &check.user_phone, |user: &mut User| {
                user.checks.retain(|c| c != id);
                Ok::<_, StoreError>(())
            })
            .await;
        match unlinked {
            Ok(()) => {}
            Err(StoreError::NotFound { .. }) => {
                warn!(check_id = %id, phone = %check.user_phone, "Owner of deleted check no longer exists");
            }
            Err(e) => return Err(e.into()),
        }
        info!(check_id = %id, "Check deleted");
        Ok(())
    }

    fn quota_error(&self) -> ApiError {
        ApiError::Validation(format!(
            "The user already has the maximum number ({}) of checks",
            self.max_checks
        ))
    }
}

fn check_id(id: &str) -> Result<&str, ApiError> {
    let id = id.trim();
    if ids::is_generated_id(id) {
        Ok(id)
    } else {
        Err(ApiError::Validation("Missing required field(s) or field(s) are invalid".into()))
    }
}

use std::sync::Arc;

use tracing::{info, warn};

use uptime_store::{Collection, RecordStore, StoreError};
use uptime_types::api::{NewUser, UserUpdate, UserView};
use uptime_types::{User, validate};

use crate::error::ApiError;
use crate::password;
use crate::tokens::TokenAuthorizer;

/// Registration and self-service edits of user accounts.
pub struct UserService {
    store: Arc<RecordStore>,
    tokens: Arc<TokenAuthorizer>,
}

impl UserService {
    pub fn new(store: Arc<RecordStore>, tokens: Arc<TokenAuthorizer>) -> Self {
        Self { store, tokens }
    }

    pub async fn create(&self, req: NewUser) -> Result<UserView, ApiError> {
        let firstname = validate::required("firstname", &req.firstname)?;
        let lastname = validate::required("lastname", &req.lastname)?;
        let phone = validate::phone(&req.phone)?;
        let secret = validate::required("password", &req.password)?;
        if !req.tos_agreement {
            return Err(ApiError::Validation("tosAgreement must be true".into()));
        }

        let user = User {
            firstname,
            lastname,
            phone,
            hashed_password: password::hash(&secret)?,
            tos_agreement: true,
            checks: Vec::new(),
        };
        match self.store.create(Collection::Users, &user.phone, &user).await {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => {
                return Err(ApiError::Conflict(
                    "A user with that phone number already exists".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        }
        info!(phone = %user.phone, "User registered");
        Ok(user.into())
    }

    pub async fn get(&self, phone: &str, token: &str) -> Result<UserView, ApiError> {
        let phone = validate::phone(phone)?;
        self.tokens.authorize(token, &phone).await?;
        let user: User = self.store.read(Collection::Users, &phone).await?;
        Ok(user.into())
    }

    /// Apply the supplied name/password fields. Blank values count as absent.
    pub async fn update(&self, req: UserUpdate, token: &str) -> Result<UserView, ApiError> {
        let phone = validate::phone(&req.phone)?;
        let firstname = non_blank(req.firstname);
        let lastname = non_blank(req.lastname);
        let new_password = non_blank(req.password);
        if firstname.is_none() && lastname.is_none() && new_password.is_none() {
            return Err(ApiError::Validation("Missing fields to update".into()));
        }
        self.tokens.authorize(token, &phone).await?;

        let hashed = new_password.as_deref().map(password::hash).transpose()?;
        let user = self
            .store
            .modify(Collection::Users, &phone, |user: &mut User| {
                if let Some(firstname) = firstname {
                    user.firstname = firstname;
                }
                if let Some(lastname) = lastname {
                    user.lastname = lastname;
                }
                if let Some(hashed) = hashed {
                    user.hashed_password = hashed;
                }
                Ok::<_, ApiError>(user.clone())
            })
            .await?;
        info!(phone = %phone, "User updated");
        Ok(user.into())
    }

    /// Remove the user, then each check they own. Check deletions that fail
    /// are collected into one `PartialCascade` error; the user stays deleted.
    pub async fn delete(&self, phone: &str, token: &str) -> Result<(), ApiError> {
        let phone = validate::phone(phone)?;
        self.tokens.authorize(token, &phone).await?;

        let user: User = self.store.read(Collection::Users, &phone).await?;
        self.store.delete(Collection::Users, &phone).await?;
        info!(phone = %phone, checks = user.checks.len(), "User deleted");

        let mut failed = Vec::new();
        for check_id in &user.checks {
            match self.store.delete(Collection::Checks, check_id).await {
                Ok(()) => {}
                // Already gone counts as deleted.
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => {
                    warn!(check_id = %check_id, error = %e, "Could not delete check of removed user");
                    failed.push(check_id.clone());
                }
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(ApiError::PartialCascade { failed })
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info};

use uptime_store::{Collection, RecordStore, StoreError};
use uptime_types::{Token, User, ids, validate};

use crate::error::ApiError;
use crate::password;

/// Lifetime of a freshly issued or extended token.
pub const TOKEN_TTL: Duration = Duration::hours(1);

/// Issues and checks the bearer tokens that gate every user and check edit.
pub struct TokenAuthorizer {
    store: Arc<RecordStore>,
}

impl TokenAuthorizer {
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    /// Log in: trade a phone and password for a new token.
    pub async fn issue(&self, phone: &str, password: &str) -> Result<Token, ApiError> {
        let phone = validate::phone(phone)?;
        let secret = validate::required("password", password)?;

        let user: User = match self.store.read(Collection::Users, &phone).await {
            Ok(user) => user,
            Err(StoreError::NotFound { .. }) => {
                return Err(ApiError::Unauthorized("Could not find the specified user".into()));
            }
            Err(e) => return Err(e.into()),
        };
        if !password::verify(&secret, &user.hashed_password) {
            return Err(ApiError::Unauthorized(
                "Password did not match the specified user's stored password".into(),
            ));
        }

        let token = Token {
            id: ids::random_id(),
            phone,
            expires: Utc::now() + TOKEN_TTL,
        };
        self.store.create(Collection::Tokens, &token.id, &token).await?;
        info!(phone = %token.phone, "Token issued");
        Ok(token)
    }

    pub async fn get(&self, id: &str) -> Result<Token, ApiError> {
        let id = token_id(id)?;
        Ok(self.store.read(Collection::Tokens, id).await?)
    }

    /// Whether `id` currently authorizes `phone`. Any lookup failure is `false`.
    pub async fn verify(&self, id: &str, phone: &str) -> bool {
        if id.is_empty() || phone.is_empty() {
            return false;
        }
        match self.store.read::<Token>(Collection::Tokens, id).await {
            Ok(token) => token.grants(phone, Utc::now()),
            Err(e) => {
                debug!(error = %e, "Token lookup failed");
                false
            }
        }
    }

    /// Push an unexpired token's expiry to one hour from now.
    pub async fn extend(&self, id: &str) -> Result<Token, ApiError> {
        let id = token_id(id)?;
        self.store
            .modify(Collection::Tokens, id, |token: &mut Token| {
                let now = Utc::now();
                if token.is_expired(now) {
                    return Err(ApiError::Validation(
                        "The token has expired, and cannot be extended".into(),
                    ));
                }
                token.expires = now + TOKEN_TTL;
                Ok(token.clone())
            })
            .await
    }

    pub async fn revoke(&self, id: &str) -> Result<(), ApiError> {
        let id = token_id(id)?;
        self.store.delete(Collection::Tokens, id).await?;
        info!("Token revoked");
        Ok(())
    }

    /// Phone of the user a valid token belongs to.
    pub async fn owner(&self, id: &str) -> Result<String, ApiError> {
        if id.is_empty() {
            return Err(ApiError::Unauthorized("Missing or invalid token".into()));
        }
        let token: Token = self
            .store
            .read(Collection::Tokens, id)
            .await
            .map_err(|_| ApiError::Unauthorized("Missing or invalid token".into()))?;
        if token.is_expired(Utc::now()) {
            return Err(ApiError::Unauthorized("Token has expired".into()));
        }
        Ok(token.phone)
    }

    /// `Forbidden` unless `id` currently authorizes `phone`.
    pub async fn authorize(&self, id: &str, phone: &str) -> Result<(), ApiError> {
        if self.verify(id, phone).await {
            Ok(())
        } else {
            Err(ApiError::missing_token())
        }
    }
}

fn token_id(id: &str) -> Result<&str, ApiError> {
    let id = id.trim();
    if ids::is_generated_id(id) {
        Ok(id)
    } else {
        Err(ApiError::Validation("Missing required field(s) or field(s) are invalid".into()))
    }
}

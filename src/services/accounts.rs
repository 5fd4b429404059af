//! Member accounts: registration, login and token resolution

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{info, warn};

use super::Actor;
use crate::auth::{
    hash_password, verify_password, Claims, JwtValidator, TokenInput, MIN_PASSWORD_LEN,
};
use crate::db::schemas::UserDoc;
use crate::store::ForumStore;
use crate::types::{ForumError, Result};

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;

/// Registration input
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// A freshly issued token and the member it belongs to
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub expires_in: u64,
    pub user: UserDoc,
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn ForumStore>,
    jwt: JwtValidator,
}

fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(ForumError::BadRequest(format!(
            "Username must be between {} and {} characters",
            MIN_USERNAME_LEN, MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ForumError::BadRequest(
            "Username may only contain letters, digits, '_' and '-'".into(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(ForumError::BadRequest("Invalid email address".into())),
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn ForumStore>, jwt: JwtValidator) -> Self {
        Self { store, jwt }
    }

    pub fn jwt(&self) -> &JwtValidator {
        &self.jwt
    }

    fn issue(&self, user: UserDoc) -> Result<AuthSession> {
        let id = user
            ._id
            .ok_or_else(|| ForumError::Internal("user without id".into()))?;
        let token = self.jwt.generate_token(TokenInput {
            user_id: id.to_hex(),
            username: user.username.clone(),
            permission_level: user.permission_level,
            version: user.token_version,
        })?;
        Ok(AuthSession {
            token,
            expires_in: self.jwt.expiry_seconds(),
            user,
        })
    }

    /// Create a member account and sign them in
    pub async fn register(&self, input: Registration) -> Result<AuthSession> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        validate_username(&username)?;
        validate_email(&email)?;
        if input.password.len() < MIN_PASSWORD_LEN {
            return Err(ForumError::BadRequest(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let mut user = UserDoc::new(username, email, password_hash);

        let id = self.store.insert_user(user.clone()).await.map_err(|e| match e {
            ForumError::Conflict(_) => {
                ForumError::Conflict("Username or email already registered".into())
            }
            other => other,
        })?;
        user._id = Some(id);

        info!(user = %id, username = %user.username, "Member registered");
        self.issue(user)
    }

    /// Sign in with a username or email
    pub async fn login(&self, identifier: &str, password: &str) -> Result<AuthSession> {
        let identifier = identifier.trim();
        if identifier.is_empty() || password.is_empty() {
            return Err(ForumError::BadRequest(
                "Missing required fields: identifier, password".into(),
            ));
        }

        let user = match self.store.find_user_by_identifier(identifier).await? {
            Some(u) => u,
            None => {
                warn!("Login failed - user not found: {}", identifier);
                return Err(ForumError::Unauthorized("Invalid credentials".into()));
            }
        };

        if !verify_password(password, &user.password_hash)? {
            warn!("Login failed - invalid password: {}", identifier);
            return Err(ForumError::Unauthorized("Invalid credentials".into()));
        }

        if !user.is_active {
            warn!("Login refused - account banned: {}", identifier);
            return Err(ForumError::Forbidden("Account is banned".into()));
        }

        info!(username = %user.username, "Member logged in");
        self.issue(user)
    }

    /// Turn verified claims into the member they name.
    ///
    /// Rejects tokens for deleted or banned members and tokens minted before
    /// the member's last ban.
    pub async fn resolve(&self, claims: &Claims) -> Result<Actor> {
        let id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| ForumError::Unauthorized("Invalid token subject".into()))?;

        let user = self
            .store
            .find_user(&id)
            .await?
            .ok_or_else(|| ForumError::Unauthorized("Account no longer exists".into()))?;

        if !user.is_active {
            return Err(ForumError::Forbidden("Account is banned".into()));
        }
        if user.token_version != claims.version {
            return Err(ForumError::Unauthorized("Token has been revoked".into()));
        }

        Ok(Actor {
            id,
            username: user.username,
            permission_level: user.permission_level,
        })
    }

    /// Current profile of the signed-in member
    pub async fn me(&self, actor: &Actor) -> Result<UserDoc> {
        self.store
            .find_user(&actor.id)
            .await?
            .ok_or_else(|| ForumError::NotFound("user not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::STARTING_REPUTATION;
    use crate::store::MemoryForumStore;

    fn service() -> (Arc<MemoryForumStore>, AccountService) {
        let store = Arc::new(MemoryForumStore::new());
        let accounts = AccountService::new(store.clone(), JwtValidator::new_dev());
        (store, accounts)
    }

    fn registration(username: &str) -> Registration {
        Registration {
            username: username.into(),
            email: format!("{username}@example.com"),
            password: "correct horse".into(),
        }
    }

    #[tokio::test]
    async fn test_register_then_login_by_email() {
        let (_store, accounts) = service();
        let session = accounts.register(registration("grace")).await.unwrap();
        assert_eq!(session.user.reputation, STARTING_REPUTATION);

        let claims = accounts.jwt().verify_token(&session.token).claims.unwrap();
        let actor = accounts.resolve(&claims).await.unwrap();
        assert_eq!(actor.username, "grace");

        let again = accounts
            .login("GRACE@example.com", "correct horse")
            .await
            .unwrap();
        assert_eq!(again.user._id, session.user._id);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let (_store, accounts) = service();

        let mut short = registration("al");
        short.username = "al".into();
        assert!(matches!(
            accounts.register(short).await,
            Err(ForumError::BadRequest(_))
        ));

        let mut weak = registration("alan");
        weak.password = "short".into();
        assert!(matches!(
            accounts.register(weak).await,
            Err(ForumError::BadRequest(_))
        ));

        accounts.register(registration("alan")).await.unwrap();
        assert!(matches!(
            accounts.register(registration("alan")).await,
            Err(ForumError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let (_store, accounts) = service();
        accounts.register(registration("linus")).await.unwrap();

        let err = accounts.login("linus", "wrong password").await.unwrap_err();
        assert!(matches!(err, ForumError::Unauthorized(_)));
        let err = accounts.login("nobody", "whatever1").await.unwrap_err();
        assert!(matches!(err, ForumError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_ban_revokes_existing_tokens() {
        let (store, accounts) = service();
        let session = accounts.register(registration("mallory")).await.unwrap();
        let id = session.user._id.unwrap();
        let claims = accounts.jwt().verify_token(&session.token).claims.unwrap();

        store.set_users_active(&[id], false).await.unwrap();
        assert!(matches!(
            accounts.resolve(&claims).await,
            Err(ForumError::Forbidden(_))
        ));
        assert!(matches!(
            accounts.login("mallory", "correct horse").await,
            Err(ForumError::Forbidden(_))
        ));

        store.set_users_active(&[id], true).await.unwrap();
        assert!(matches!(
            accounts.resolve(&claims).await,
            Err(ForumError::Unauthorized(_))
        ));
        let fresh = accounts.login("mallory", "correct horse").await.unwrap();
        let fresh_claims = accounts.jwt().verify_token(&fresh.token).claims.unwrap();
        assert!(accounts.resolve(&fresh_claims).await.is_ok());
    }
}

/*
 * Responsibility
 * - Collaborator seams: CredentialVerifier (login) and RoleLookup (per request)
 * - InMemoryUserStore: reference implementation backed by configuration
 *
 * Notes
 * - Real deployments plug a directory / database behind these traits.
 * - Roles are looked up on every request so revocation takes effect without
 *   waiting for tokens to expire.
 */
use std::collections::{BTreeSet, HashMap};

use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use async_trait::async_trait;
use thiserror::Error;

use crate::services::auth::principal::Principal;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Unknown user or wrong password; callers must not tell them apart.
    #[error("bad credentials")]
    BadCredentials,

    #[error("unknown subject")]
    UnknownSubject,

    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, username: &str, password: &str) -> Result<Principal, CredentialError>;
}

#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn roles_for(&self, subject: &str) -> Result<BTreeSet<String>, CredentialError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UserStoreError {
    #[error("user entry {index}: {reason}")]
    InvalidEntry { index: usize, reason: &'static str },

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Argon2id PHC string for `password` with a random salt.
pub fn hash_password(password: &str) -> Result<String, UserStoreError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserStoreError::Hashing(e.to_string()))
}

#[derive(Clone)]
struct UserRecord {
    /// PHC string, checked to parse when the record is created.
    password_hash: String,
    roles: BTreeSet<String>,
}

/// Users held in memory, passwords stored as argon2 PHC strings.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: HashMap<String, UserRecord>,
}

impl std::fmt::Debug for InMemoryUserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryUserStore")
            .field("users", &self.users.len())
            .finish()
    }
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name:$argon2id$...:ROLE_A|ROLE_B;name2:...`.
    ///
    /// Role list may be empty. Blank entries are skipped.
    pub fn parse(spec: &str) -> Result<Self, UserStoreError> {
        let mut store = Self::new();

        for (index, entry) in spec
            .split(';')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .enumerate()
        {
            let invalid = |reason| UserStoreError::InvalidEntry { index, reason };

            let mut fields = entry.splitn(3, ':');
            let username = fields.next().unwrap_or_default().trim();
            let password_hash = fields.next().ok_or(invalid("missing password hash"))?.trim();
            let roles = fields.next().unwrap_or_default();

            if username.is_empty() {
                return Err(invalid("empty username"));
            }
            if PasswordHash::new(password_hash).is_err() {
                return Err(invalid("password hash must be a PHC string"));
            }

            store.users.insert(
                username.to_string(),
                UserRecord {
                    password_hash: password_hash.to_string(),
                    roles: roles
                        .split('|')
                        .map(str::trim)
                        .filter(|r| !r.is_empty())
                        .map(str::to_string)
                        .collect(),
                },
            );
        }

        Ok(store)
    }

    /// Add a user from a plaintext password.
    pub fn with_user<I, R>(
        mut self,
        username: &str,
        password: &str,
        roles: I,
    ) -> Result<Self, UserStoreError>
    where
        I: IntoIterator<Item = R>,
        R: Into<String>,
    {
        self.users.insert(
            username.to_string(),
            UserRecord {
                password_hash: hash_password(password)?,
                roles: roles.into_iter().map(Into::into).collect(),
            },
        );
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl CredentialVerifier for InMemoryUserStore {
    async fn verify(&self, username: &str, password: &str) -> Result<Principal, CredentialError> {
        let Some(user) = self.users.get(username) else {
            return Err(CredentialError::BadCredentials);
        };

        // CPU bound; off the async workers.
        let password_hash = user.password_hash.clone();
        let password = password.to_string();
        let matched =
            tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
                .await
                .map_err(|e| CredentialError::Unavailable(e.to_string()))??;

        if matched {
            Ok(Principal::new(username, user.roles.iter().cloned()))
        } else {
            Err(CredentialError::BadCredentials)
        }
    }
}

#[async_trait]
impl RoleLookup for InMemoryUserStore {
    async fn roles_for(&self, subject: &str) -> Result<BTreeSet<String>, CredentialError> {
        self.users
            .get(subject)
            .map(|u| u.roles.clone())
            .ok_or(CredentialError::UnknownSubject)
    }
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool, CredentialError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| CredentialError::Unavailable(format!("stored hash unreadable: {e}")))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(CredentialError::Unavailable(e.to_string())),
    }
}

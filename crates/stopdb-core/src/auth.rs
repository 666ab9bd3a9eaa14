//! Non-interactive superuser provisioning.
//!
//! Credentials come from a [`CredentialProvider`] rather than a prompt; the
//! production implementation reads the `STOPDB_SUPERUSER_*` environment
//! variables. That is fine for local development (the only supported
//! deployment of this tooling) and the trait is the seam for anything
//! better.

use anyhow::{bail, Context};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

use crate::settings::SecretKey;
use crate::storage::Store;

type HmacSha256 = Hmac<Sha256>;

pub const USERNAME_VAR: &str = "STOPDB_SUPERUSER_USERNAME";
pub const PASSWORD_VAR: &str = "STOPDB_SUPERUSER_PASSWORD";
pub const EMAIL_VAR: &str = "STOPDB_SUPERUSER_EMAIL";

#[derive(Debug, Clone)]
pub struct SuperuserCredentials {
    pub username: String,
    pub password: String,
    pub email: String,
}

pub trait CredentialProvider {
    fn superuser(&self) -> anyhow::Result<SuperuserCredentials>;
}

/// Reads credentials from the process environment.
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn superuser(&self) -> anyhow::Result<SuperuserCredentials> {
        let get = |var: &str| {
            std::env::var(var).map_err(|_| anyhow::anyhow!("missing environment variable {}", var))
        };
        Ok(SuperuserCredentials {
            username: get(USERNAME_VAR)?,
            password: get(PASSWORD_VAR)?,
            email: get(EMAIL_VAR)?,
        })
    }
}

/// Fixed credentials, for tests and embedding.
pub struct StaticCredentials(pub SuperuserCredentials);

impl CredentialProvider for StaticCredentials {
    fn superuser(&self) -> anyhow::Result<SuperuserCredentials> {
        Ok(self.0.clone())
    }
}

/// Create the administrative account.
///
/// The caller guarantees a fresh database; an existing user with the same
/// username is an error, not an update.
pub fn create_superuser(
    store: &Store,
    secret_key: &SecretKey,
    credentials: &SuperuserCredentials,
) -> anyhow::Result<i64> {
    let username = credentials.username.trim();
    if username.is_empty() {
        bail!("superuser username must not be empty");
    }
    if !credentials.email.contains('@') {
        bail!("superuser email {:?} is not an email address", credentials.email);
    }
    if credentials.password.is_empty() {
        bail!("superuser password must not be empty");
    }
    if store.user_by_username(username)?.is_some() {
        bail!("user {:?} already exists", username);
    }
    let hash = hash_password(secret_key, &credentials.password);
    let id = store
        .insert_user(username, &credentials.email, &hash, true)
        .context("create superuser")?;
    tracing::info!(username, id, "created superuser");
    Ok(id)
}

/// Hash a password as `hmac-sha256$<salt-hex>$<digest-hex>`, keyed by the
/// application secret.
pub fn hash_password(secret_key: &SecretKey, password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = password_digest(secret_key, &salt, password);
    format!("hmac-sha256${}${}", hex::encode(salt), hex::encode(digest))
}

/// Check a password against a stored hash. Malformed hashes never verify.
pub fn verify_password(secret_key: &SecretKey, password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some("hmac-sha256"), Some(salt_hex), Some(digest_hex), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    let digest = password_digest(secret_key, &salt, password);
    // Same-shape comparison; both sides are fixed-width digests.
    digest.as_slice() == expected.as_slice()
}

fn password_digest(secret_key: &SecretKey, salt: &[u8], password: &str) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret_key.as_bytes()).expect("hmac accepts any key length");
    mac.update(salt);
    mac.update(password.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

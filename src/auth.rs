//! Identity provider integration and credential decoding
use std::env;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CactusError, Result};

/// The payload handed back by the identity provider after a login attempt.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialResponse {
    /// The encoded identity assertion.  Absent when the login did not complete.
    pub credential: Option<String>,
    /// The client the credential was issued to
    #[serde(alias = "clientId")]
    pub client_id: Option<String>,
    /// How the user picked the account (e.g. "btn", "auto")
    pub select_by: Option<String>,
}

impl CredentialResponse {
    pub fn with_credential(credential: impl Into<String>) -> Self {
        Self {
            credential: Some(credential.into()),
            ..Default::default()
        }
    }
}

/// A trait for obtaining a credential from the identity provider.
///
/// The client identifier is the value registered with the provider for this
/// deployment.  An error returned here is a login failure and must not change
/// the session.
#[async_trait]
pub trait IdentityProvider: std::fmt::Debug + Send + Sync {
    async fn sign_in(&self, client_id: &str) -> Result<CredentialResponse>;
}

/// Hands back a credential that was obtained out of band.
pub struct StaticCredentialProvider {
    credential: String,
}

impl StaticCredentialProvider {
    pub fn new(credential: impl Into<String>) -> Self {
        Self {
            credential: credential.into(),
        }
    }
}

impl std::fmt::Debug for StaticCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentialProvider")
            .field("credential", &"**********")
            .finish()
    }
}

#[async_trait]
impl IdentityProvider for StaticCredentialProvider {
    async fn sign_in(&self, client_id: &str) -> Result<CredentialResponse> {
        Ok(CredentialResponse {
            credential: Some(self.credential.clone()),
            client_id: Some(client_id.to_string()),
            select_by: Some("static".to_string()),
        })
    }
}

/// A credential provider that reads the credential from an environment variable.
pub struct EnvCredentialProvider {
    credential: String,
}

// Custom implementation of Debug to avoid printing the credential
impl std::fmt::Debug for EnvCredentialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentialProvider")
            .field("credential", &"**********")
            .finish()
    }
}

impl EnvCredentialProvider {
    pub const DEFAULT_VAR: &'static str = "CACTUS_ID_TOKEN";

    pub fn try_new(env_var: &str) -> Result<Self> {
        let credential = env::var(env_var)
            .map_err(|_| CactusError::LoginFailed(format!("{} is not set", env_var)))?;
        Ok(Self { credential })
    }
}

#[async_trait]
impl IdentityProvider for EnvCredentialProvider {
    async fn sign_in(&self, client_id: &str) -> Result<CredentialResponse> {
        Ok(CredentialResponse {
            credential: Some(self.credential.clone()),
            client_id: Some(client_id.to_string()),
            select_by: Some("env".to_string()),
        })
    }
}

/// User display fields decoded from a credential
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub picture: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Deserialize)]
struct CredentialClaims {
    exp: i64,
    #[serde(default)]
    name: String,
    #[serde(default)]
    picture: String,
    #[serde(default)]
    email: String,
}

/// Decodes the profile carried in the payload segment of a credential.
///
/// The signature is not verified; the backend is responsible for that.
/// Expiry is checked by the session, not here.
pub fn decode_profile(credential: &str) -> Result<Profile> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    // Some issuers pad the base64url segments
    let unpadded = credential.replace('=', "");
    let token_data = decode::<CredentialClaims>(&unpadded, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| {
            debug!("credential decoding failed: {}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim) => {
                    CactusError::InvalidCredential(format!("missing {} claim", claim))
                }
                _ => CactusError::InvalidCredential(e.to_string()),
            }
        })?;
    let claims = token_data.claims;

    let expires_at = Utc
        .timestamp_opt(claims.exp, 0)
        .single()
        .ok_or_else(|| CactusError::InvalidCredential("exp is out of range".to_string()))?;

    Ok(Profile {
        name: claims.name,
        picture: claims.picture,
        email: claims.email,
        expires_at,
    })
}

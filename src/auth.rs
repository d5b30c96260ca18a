//! Request identity - signed session tokens and the legacy trusted-client mode.
//!
//! With a shared secret configured, every protected request must carry
//! `Authorization: Bearer <token>` where the token is
//! `uid|email|expires|sig` and `sig` is the hex SHA-256 of
//! `"{secret}:{uid}:{email}:{expires}"`. The caller is whoever the token
//! names; identity fields in bodies and query strings are ignored.
//!
//! With no secret (unset, blank or "0") the service trusts the client and
//! takes the identity from `submittedBy` / `requestingUser`.

use crate::{
    config::secrets,
    core::guard::Caller,
    errors::{Error, Result},
};
use axum::http::{HeaderMap, header::AUTHORIZATION};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Issues and checks session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    secret: String,
    ttl_secs: i64,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

fn unauthenticated(message: &str) -> Error {
    Error::Unauthenticated {
        message: message.to_string(),
    }
}

impl SessionSigner {
    /// Signer for `secret` issuing tokens valid for `ttl_secs`.
    pub fn new(secret: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            ttl_secs,
        }
    }

    fn signature(&self, uid: &str, email: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{uid}:{email}:{expires}", self.secret).as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Issues a token for `uid`/`email` that expires `ttl_secs` after `now`.
    ///
    /// # Errors
    /// Returns a validation error if either part contains the `|` separator.
    pub fn issue(&self, uid: &str, email: &str, now: i64) -> Result<String> {
        if uid.is_empty() || email.is_empty() || uid.contains('|') || email.contains('|') {
            return Err(Error::validation("Session identity must be non-empty and free of '|'"));
        }
        let expires = now.saturating_add(self.ttl_secs);
        let sig = self.signature(uid, email, expires);
        Ok(format!("{uid}|{email}|{expires}|{sig}"))
    }

    /// Checks a token's signature and expiry as of `now`.
    ///
    /// # Errors
    /// Returns [`Error::Unauthenticated`] for malformed, tampered or expired
    /// tokens.
    pub fn verify(&self, token: &str, now: i64) -> Result<Caller> {
        let parts: Vec<&str> = token.split('|').collect();
        let [uid, email, expires, sig] = parts.as_slice() else {
            return Err(unauthenticated("Malformed session token"));
        };
        let expires: i64 = expires
            .parse()
            .map_err(|_| unauthenticated("Malformed session token"))?;

        if self.signature(uid, email, expires) != *sig {
            warn!(%email, "Rejected session token with bad signature");
            return Err(unauthenticated("Invalid session token"));
        }
        if expires <= now {
            debug!(%email, "Rejected expired session token");
            return Err(unauthenticated("Session expired"));
        }

        Ok(Caller::verified(*uid, *email))
    }
}

/// How requests are attributed to users.
#[derive(Debug, Clone)]
pub enum AuthMode {
    /// Bearer tokens signed with a shared secret
    Signed(SessionSigner),
    /// Identity taken from the request itself
    Trusted,
}

impl AuthMode {
    /// Picks the mode from `SPINVENTORY_AUTH_SECRET` and
    /// `SPINVENTORY_SESSION_TTL_SECS`.
    pub fn from_env() -> Result<Self> {
        match secrets::auth_secret() {
            Some(secret) => Ok(Self::Signed(SessionSigner::new(
                secret,
                secrets::session_ttl_secs()?,
            ))),
            None => Ok(Self::Trusted),
        }
    }

    #[must_use]
    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Signed(_))
    }

    /// Works out who is making a request.
    ///
    /// `claimed` is the email the client put in the body or query string; it
    /// is only consulted in trusted mode.
    ///
    /// # Errors
    /// Signed mode: [`Error::Unauthenticated`] without a valid bearer token.
    /// Trusted mode: [`Error::Validation`] when no identity was supplied.
    pub fn resolve(&self, headers: &HeaderMap, claimed: Option<&str>) -> Result<Caller> {
        match self {
            Self::Signed(signer) => {
                let token = headers
                    .get(AUTHORIZATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.strip_prefix("Bearer "))
                    .map(str::trim)
                    .ok_or_else(|| unauthenticated("Missing session token"))?;
                signer.verify(token, chrono::Utc::now().timestamp())
            }
            Self::Trusted => claimed
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(Caller::from_email)
                .ok_or_else(|| Error::validation("Requesting user is required")),
        }
    }
}

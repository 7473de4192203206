//! Credential checks for admitting peers, and minting for simulated ones.
//!
//! Tether doesn't define what a credential is. It defines two small traits:
//!
//! - [`Authenticator`] — "is this bearer token valid, and what does it
//!   claim?" (server side)
//! - [`CredentialIssuer`] — "give me a token for these claims" (load
//!   generator side)
//!
//! [`SharedSecretAuth`] implements both with HS256 JWTs signed by one
//! shared key, which is what the bundled binaries use.
//!
//! # Why is `verify` synchronous?
//!
//! It runs inside the WebSocket upgrade handshake, before the server
//! answers `101 Switching Protocols`. That hook is a plain function, so the
//! check has to finish without awaiting.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tether_protocol::Claims;

use crate::SessionError;

/// Validates a bearer credential and returns what it asserts.
///
/// `Send + Sync + 'static` because one authenticator is shared by every
/// connection task for the life of the server.
///
/// # Example
///
/// ```rust
/// use tether_protocol::Claims;
/// use tether_session::{Authenticator, SessionError};
///
/// /// Accepts `"<uid>:<ts>"` verbatim. Development only.
/// struct PlainAuthenticator;
///
/// impl Authenticator for PlainAuthenticator {
///     fn verify(&self, token: &str) -> Result<Claims, SessionError> {
///         let (uid, ts) = token.split_once(':').ok_or_else(|| {
///             SessionError::AuthFailed("expected uid:ts".into())
///         })?;
///         let ts = ts
///             .parse()
///             .map_err(|_| SessionError::AuthFailed("bad ts".into()))?;
///         Ok(Claims::new(uid, ts))
///     }
/// }
///
/// let claims = PlainAuthenticator.verify("7:100").unwrap();
/// assert_eq!(claims, Claims::new("7", 100));
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Checks `token` and returns its claims.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`] if the token is invalid.
    fn verify(&self, token: &str) -> Result<Claims, SessionError>;
}

/// Produces bearer credentials for outbound connections.
pub trait CredentialIssuer: Send + Sync + 'static {
    /// Mints a token asserting `claims`.
    ///
    /// # Errors
    /// [`SessionError::MintFailed`] if signing fails.
    fn mint(&self, claims: &Claims) -> Result<String, SessionError>;
}

/// HS256 JWTs with a single shared secret.
///
/// Tokens carry only `uid` and `ts`; there is no expiry claim, so
/// `exp` validation is switched off.
pub struct SharedSecretAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl SharedSecretAuth {
    /// Creates an authenticator/issuer for the given secret.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl Authenticator for SharedSecretAuth {
    fn verify(&self, token: &str) -> Result<Claims, SessionError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| SessionError::AuthFailed(e.to_string()))
    }
}

impl CredentialIssuer for SharedSecretAuth {
    fn mint(&self, claims: &Claims) -> Result<String, SessionError> {
        let header = Header::new(Algorithm::HS256);
        jsonwebtoken::encode(&header, claims, &self.encoding)
            .map_err(|e| SessionError::MintFailed(e.to_string()))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme is matched case-insensitively.
///
/// # Errors
/// [`SessionError::MissingCredential`] if the header is absent, uses
/// another scheme, or carries an empty token.
pub fn bearer_token(header: Option<&str>) -> Result<&str, SessionError> {
    let value = header.ok_or(SessionError::MissingCredential)?.trim();
    let (scheme, token) = value
        .split_once(' ')
        .ok_or(SessionError::MissingCredential)?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(SessionError::MissingCredential);
    }
    Ok(token)
}

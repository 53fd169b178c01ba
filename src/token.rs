//! Manage json web tokens for the identity gateway.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};

/// Token lifetime in seconds.
pub const EXPIRATION_TIME: u64 = 60 * 15; // 15 minutes.
const TOKEN_USE_ACCESS: &str = "access";

/// Pieces of information asserted on a JWT.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Claims {
    /// Recipients that the JWT is intended for. Identity client id.
    pub aud: String,
    /// Identifies the expiration time on or after which the JWT must not be
    /// accepted for processing.
    pub exp: u64,
    /// Identifies the time at which the JWT was issued.
    pub iat: u64,
    /// Identity pool that issued the JWT.
    pub iss: String,
    /// Subject identifier, the stable user id.
    pub sub: String,
    /// Whether this is an access or an id token.
    pub token_use: String,
}

/// Issue and verify access tokens on behalf of the identity directory.
#[derive(Clone)]
pub struct TokenManager {
    algorithm: Algorithm,
    decoding_key: DecodingKey,
    encoding_key: EncodingKey,
    issuer: String,
    audience: String,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a new [`TokenManager`] instance.
    ///
    /// `pool_id` becomes the token issuer, `client_id` the audience and
    /// `client_secret` the HS256 signing key.
    pub fn new(pool_id: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            decoding_key: DecodingKey::from_secret(client_secret.as_bytes()),
            encoding_key: EncodingKey::from_secret(client_secret.as_bytes()),
            issuer: pool_id.to_owned(),
            audience: client_id.to_owned(),
        }
    }

    /// Create a new access token for a subject.
    pub fn create(&self, subject: &str) -> Result<String> {
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|err| ServerError::Internal {
                details: "system clock before unix epoch".into(),
                source: Some(Box::new(err)),
            })?
            .as_secs();
        let header = Header::new(self.algorithm);
        let claims = Claims {
            aud: self.audience.clone(),
            exp: time + EXPIRATION_TIME,
            iat: time,
            iss: self.issuer.clone(),
            sub: subject.to_owned(),
            token_use: TOKEN_USE_ACCESS.to_owned(),
        };

        encode(&header, &claims, &self.encoding_key).map_err(|err| {
            ServerError::Internal {
                details: "access token signing failed".into(),
                source: Some(Box::new(err)),
            }
        })
    }

    /// Decode and check a token. Signature, expiry, issuer and audience are
    /// all enforced.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_audience(&[&self.audience]);
        validation.set_issuer(&[&self.issuer]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| ServerError::Unauthorized)
    }
}

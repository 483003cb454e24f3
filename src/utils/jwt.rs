//! Stateless bearer-token verification, SPEC_FULL A2's "JWT bearer auth
//! middleware on protected routes". `jwt.rs` itself was absent from the
//! retrieved teacher pack (`utils/mod.rs` re-exports it but the file wasn't
//! retrieved); authored fresh in the same `jsonwebtoken` idiom, thinned to
//! stateless issue/verify since the Casbin/user/organization layer the
//! teacher built it against was dropped along with that subsystem.

use chrono::Duration;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::utils::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

pub struct JwtUtil {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtUtil {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mints a token for `subject`, valid for `ttl`. Used by the `token` CLI
    /// subcommand — there is no login endpoint, tokens are minted out of
    /// band by whoever holds `jwt_secret`.
    pub fn issue_token(&self, subject: &str, ttl: Duration) -> Result<String, ApiError> {
        let exp = (chrono::Utc::now() + ttl).timestamp();
        let claims = Claims { sub: subject.to_string(), exp };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Fatal(format!("failed to issue token: {e}")))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_freshly_issued_token() {
        let jwt = JwtUtil::new("test-secret");
        let token = jwt.issue_token("ops", Duration::hours(1)).unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "ops");
    }

    #[test]
    fn rejects_a_token_signed_with_a_different_secret() {
        let issuer = JwtUtil::new("secret-a");
        let verifier = JwtUtil::new("secret-b");
        let token = issuer.issue_token("ops", Duration::hours(1)).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }
}

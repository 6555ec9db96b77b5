//! HS256 bearer tokens carrying the shopper's user id.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use stockroom_app::ids::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) user_id: i64,

    /// Expiration time (UTC Unix timestamp).
    pub(crate) exp: i64,
}

#[derive(Clone)]
pub(crate) struct JwtKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub(crate) fn from_secret(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Check the signature and expiry, returning the user the token was issued to.
    pub(crate) fn verify(&self, token: &str) -> Result<UserId, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;

        Ok(UserId::from_i64(data.claims.user_id))
    }
}

/// Sign a token for `user` that expires at `exp`. Tokens are minted by the
/// account service in production.
#[cfg(test)]
pub(crate) fn issue(
    secret: &str,
    user: UserId,
    exp: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    use jsonwebtoken::{EncodingKey, Header, encode};

    encode(
        &Header::new(Algorithm::HS256),
        &Claims {
            user_id: user.into_i64(),
            exp,
        },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use testresult::TestResult;

    use super::*;

    fn in_one_hour() -> i64 {
        Timestamp::now().as_second() + 3_600
    }

    #[test]
    fn issued_token_verifies_to_its_user() -> TestResult {
        let keys = JwtKeys::from_secret("secret");
        let token = issue("secret", UserId::from_i64(42), in_one_hour())?;

        assert_eq!(keys.verify(&token)?, UserId::from_i64(42));

        Ok(())
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() -> TestResult {
        let token = issue("other", UserId::from_i64(42), in_one_hour())?;

        assert!(JwtKeys::from_secret("secret").verify(&token).is_err());

        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> TestResult {
        let keys = JwtKeys::from_secret("secret");
        let token = issue("secret", UserId::from_i64(42), Timestamp::now().as_second() - 3_600)?;

        assert!(keys.verify(&token).is_err());

        Ok(())
    }
}

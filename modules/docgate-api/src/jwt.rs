use docgate_common::ClaimSet;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const TOKEN_DURATION_SECS: i64 = 24 * 3600; // 24 hours

/// JWT claims the gateway reads and issues.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Not a compact JWS (three base64url segments with a parseable header)
    #[error("malformed token")]
    Malformed,

    /// Signature, algorithm or issuer check failed
    #[error("invalid signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    /// Verified token carries an empty subject
    #[error("token has no subject")]
    MissingSubject,
}

/// Verifies bearer tokens and extracts the caller's identity.
///
/// Holds only key material, so one instance is shared by every request.
#[derive(Clone)]
pub struct ClaimVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
}

impl ClaimVerifier {
    pub fn new(secret: &str, issuer: Option<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
        }
    }

    /// Issue a 24h token for `subject`.
    pub fn issue(&self, subject: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::seconds(TOKEN_DURATION_SECS);
        self.encode_claims(&Claims {
            sub: subject.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::default(), claims, &self.encoding_key)
    }

    /// Verify a raw token. Structure is checked before any signature work.
    pub fn verify(&self, token: &str) -> Result<ClaimSet, AuthError> {
        if !is_compact_jws(token) {
            return Err(AuthError::Malformed);
        }
        decode_header(token).map_err(|_| AuthError::Malformed)?;

        let mut validation = Validation::default();
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::Malformed,
                _ => AuthError::InvalidSignature,
            })?;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::MissingSubject);
        }

        Ok(ClaimSet {
            subject_id: claims.sub,
            token_valid: true,
        })
    }
}

/// `header.payload.signature`, each segment non-empty base64url.
fn is_compact_jws(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() == 3
        && segments.iter().all(|s| {
            !s.is_empty()
                && s
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token verification against a trust domain's key set.
//!
//! ## Checks, in order
//!
//! 1. Header parses and names an asymmetric algorithm
//! 2. Header carries a `kid`
//! 3. The key set of the trust domain has that `kid`
//! 4. Signature verifies with that key
//! 5. `exp` / `nbf` hold (with clock-skew leeway)
//! 6. The expected audience is among the token's audiences
//! 7. `iss` is `https://{trust_domain}/`
//!
//! Symmetric algorithms are refused before any key lookup, so a public key
//! can never be used as an HMAC secret.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{AlgorithmParameters, EllipticCurve, Jwk};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use tracing::debug;

use super::claims::TokenClaims;
use super::error::AuthError;
use super::jwks::JwksCache;

/// Default clock skew tolerance (60 seconds).
pub const DEFAULT_LEEWAY_SECS: u64 = 60;

/// Algorithms accepted in token headers.
pub const ASYMMETRIC_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Issuer a token from `domain` must carry.
pub fn expected_issuer(domain: &str) -> String {
    format!("https://{domain}/")
}

/// Verifies bearer tokens.
pub struct TokenVerifier {
    cache: Arc<JwksCache>,
    leeway: u64,
}

impl TokenVerifier {
    pub fn new(cache: Arc<JwksCache>) -> Self {
        Self {
            cache,
            leeway: DEFAULT_LEEWAY_SECS,
        }
    }

    pub fn with_leeway(mut self, leeway_secs: u64) -> Self {
        self.leeway = leeway_secs;
        self
    }

    /// The key-set cache this verifier reads from.
    pub fn cache(&self) -> &Arc<JwksCache> {
        &self.cache
    }

    /// Verify `token` for `domain` and `audience`.
    pub async fn verify(
        &self,
        token: &str,
        domain: &str,
        audience: &str,
    ) -> Result<TokenClaims, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::MalformedToken)?;
        if !ASYMMETRIC_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let kid = header
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(AuthError::MissingKeyId)?;

        let jwk = self.cache.get_key(domain, kid).await?;
        if !key_fits_algorithm(&jwk, header.alg) {
            debug!(kid, alg = ?header.alg, "Key type does not match token algorithm");
            return Err(AuthError::BadSignature);
        }
        let key = DecodingKey::from_jwk(&jwk).map_err(|_| AuthError::BadSignature)?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // Audience and issuer are checked below, after the signature.
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<TokenClaims>(token, &key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthError::BadSignature,
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::ImmatureSignature => AuthError::TokenNotYetValid,
                _ => AuthError::MalformedToken,
            })?
            .claims;

        if !claims.has_audience(audience) {
            return Err(AuthError::InvalidAudience);
        }
        if claims.iss != expected_issuer(domain) {
            return Err(AuthError::InvalidIssuer);
        }

        Ok(claims)
    }
}

/// Whether the JWK's key family can verify `alg`.
fn key_fits_algorithm(jwk: &Jwk, alg: Algorithm) -> bool {
    match (&jwk.algorithm, alg) {
        (
            AlgorithmParameters::RSA(_),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
        ) => true,
        (AlgorithmParameters::EllipticCurve(ec), Algorithm::ES256) => {
            ec.curve == EllipticCurve::P256
        }
        (AlgorithmParameters::EllipticCurve(ec), Algorithm::ES384) => {
            ec.curve == EllipticCurve::P384
        }
        (AlgorithmParameters::OctetKeyPair(_), Algorithm::EdDSA) => true,
        _ => false,
    }
}

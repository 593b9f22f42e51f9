//! Request signature verification.
//!
//! Every request from Slack carries `X-Slack-Signature`, which is `v0=`
//! followed by hex(HMAC-SHA256(signing secret, `v0:{timestamp}:{body}`)).

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{SlackError, SlackResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-slack-signature";
/// Header carrying the request timestamp.
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
/// Oldest accepted request age, in seconds.
pub const MAX_REQUEST_AGE_SECS: i64 = 300;

const VERSION: &str = "v0";

/// Verifies inbound requests against the app's signing secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SignatureVerifier {
    pub fn new(signing_secret: &str) -> Self {
        Self {
            secret: signing_secret.as_bytes().to_vec(),
        }
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> SlackResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| SlackError::SignatureVerification(e.to_string()))?;
        mac.update(VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }

    /// Compute the `X-Slack-Signature` value for a request.
    pub fn sign(&self, timestamp: &str, body: &[u8]) -> SlackResult<String> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{VERSION}={}", hex::encode(digest)))
    }

    /// Verify a request against the current time.
    pub fn verify(&self, timestamp: &str, body: &[u8], signature: &str) -> SlackResult<()> {
        self.verify_at(Utc::now().timestamp(), timestamp, body, signature)
    }

    /// Verify a request as of `now` (unix seconds).
    pub fn verify_at(
        &self,
        now: i64,
        timestamp: &str,
        body: &[u8],
        signature: &str,
    ) -> SlackResult<()> {
        let sent: i64 = timestamp.trim().parse().map_err(|_| {
            SlackError::SignatureVerification(format!("bad timestamp: {}", timestamp))
        })?;
        if (now - sent).abs() > MAX_REQUEST_AGE_SECS {
            return Err(SlackError::SignatureVerification(
                "request timestamp is too old".to_string(),
            ));
        }

        let expected = signature
            .strip_prefix("v0=")
            .and_then(|h| hex::decode(h).ok())
            .ok_or_else(|| {
                SlackError::SignatureVerification("malformed signature header".to_string())
            })?;

        self.mac(timestamp.trim(), body)?
            .verify_slice(&expected)
            .map_err(|_| SlackError::SignatureVerification("signature mismatch".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Example from Slack's signing documentation.
    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";
    const TIMESTAMP: &str = "1531420618";
    const BODY: &str = "token=xyzz0WbapA4vBCDEFasx0q6G&team_id=T1DC2JH3J&team_domain=testteamnow&channel_id=G8PSS9T3V&channel_name=foobar&user_id=U2CERLKJA&user_name=roadrunner&command=%2Fwebhook-collect&text=&response_url=https%3A%2F%2Fhooks.slack.com%2Fcommands%2FT1DC2JH3J%2F397700885554%2F96rGlfmibIGlgcZRskXaIFfN&trigger_id=398738663015.47445629121.803a0bc887a14d10d2c447fce8b6703c";
    const SIGNATURE: &str =
        "v0=a2114d57b48eac39b9ad189dd8316235a7b4a8d21a10bd27519666489c69b503";

    #[test]
    fn test_known_signature() {
        let verifier = SignatureVerifier::new(SECRET);
        assert_eq!(verifier.sign(TIMESTAMP, BODY.as_bytes()).unwrap(), SIGNATURE);
        assert!(
            verifier
                .verify_at(1531420618, TIMESTAMP, BODY.as_bytes(), SIGNATURE)
                .is_ok()
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let err = verifier
            .verify_at(1531420618, TIMESTAMP, b"token=other", SIGNATURE)
            .unwrap_err();
        assert!(matches!(err, SlackError::SignatureVerification(_)));
    }

    #[test]
    fn test_stale_request_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        let now = 1531420618 + MAX_REQUEST_AGE_SECS + 1;
        assert!(
            verifier
                .verify_at(now, TIMESTAMP, BODY.as_bytes(), SIGNATURE)
                .is_err()
        );
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let verifier = SignatureVerifier::new(SECRET);
        assert!(
            verifier
                .verify_at(1531420618, "yesterday", BODY.as_bytes(), SIGNATURE)
                .is_err()
        );
        assert!(
            verifier
                .verify_at(1531420618, TIMESTAMP, BODY.as_bytes(), "v1=abcd")
                .is_err()
        );
    }

    #[test]
    fn test_sign_then_verify_now() {
        let verifier = SignatureVerifier::new("secret");
        let ts = Utc::now().timestamp().to_string();
        let sig = verifier.sign(&ts, b"{}").unwrap();
        assert!(verifier.verify(&ts, b"{}", &sig).is_ok());
    }
}

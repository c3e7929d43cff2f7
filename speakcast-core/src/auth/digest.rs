//! RFC 2617 / RFC 7616 Digest response computation (qop=auth).

use md5::Md5;
use sha2::{Digest, Sha256};

use super::challenge::{DigestAlgorithm, DigestChallenge};
use super::AuthError;
use crate::device::Credentials;

/// Nonce count (`nc`) rendered as eight lower-case hex digits.
///
/// Scoped to a single server nonce. Exactly one authenticated retry is
/// issued per challenge, so every computed response uses [`NonceCount::FIRST`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NonceCount(u32);

impl NonceCount {
    pub const FIRST: NonceCount = NonceCount(1);

    pub fn next(self) -> NonceCount {
        NonceCount(self.0.wrapping_add(1))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for NonceCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Values that make up one `Authorization: Digest ...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestCredentialResponse {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub qop: String,
    pub nc: NonceCount,
    pub cnonce: String,
    pub response: String,
    pub opaque: Option<String>,
    /// Echoed only when the challenge named an algorithm.
    pub algorithm: Option<DigestAlgorithm>,
}

impl DigestCredentialResponse {
    /// Renders the value for an `Authorization` header.
    pub fn to_header_value(&self) -> String {
        let mut header = format!(
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", qop={}, nc={}, cnonce="{}", response="{}""#,
            quote_escape(&self.username),
            quote_escape(&self.realm),
            quote_escape(&self.nonce),
            quote_escape(&self.uri),
            self.qop,
            self.nc,
            self.cnonce,
            self.response,
        );
        if let Some(opaque) = &self.opaque {
            header.push_str(&format!(r#", opaque="{}""#, quote_escape(opaque)));
        }
        if let Some(algorithm) = self.algorithm {
            header.push_str(&format!(", algorithm={}", algorithm.as_directive()));
        }
        header
    }
}

/// Computes Digest credentials from a parsed challenge.
///
/// Holds no per-request state: a fresh client nonce is drawn for every
/// computation and nothing is cached between challenges, since the server
/// may rotate its nonce at any time.
#[derive(Debug, Clone, Default)]
pub struct DigestAuthenticator;

impl DigestAuthenticator {
    pub fn new() -> Self {
        Self
    }

    /// Computes the response for `method uri` against a raw
    /// `WWW-Authenticate` header value.
    ///
    /// # Errors
    ///
    /// - `AuthError::UnsupportedChallenge` - header is not a usable Digest challenge
    pub fn compute_response_from_header(
        &self,
        method: &str,
        uri: &str,
        www_authenticate: &str,
        credentials: &Credentials,
    ) -> Result<DigestCredentialResponse, AuthError> {
        let challenge = DigestChallenge::parse(www_authenticate)?;
        Ok(self.compute_response(method, uri, &challenge, credentials))
    }

    /// Computes the response with a freshly generated client nonce.
    pub fn compute_response(
        &self,
        method: &str,
        uri: &str,
        challenge: &DigestChallenge,
        credentials: &Credentials,
    ) -> DigestCredentialResponse {
        self.compute_response_with_cnonce(method, uri, challenge, credentials, &generate_cnonce())
    }

    /// Computes the response for a caller-supplied client nonce.
    ///
    /// The result is a pure function of its inputs, which is what makes
    /// golden-vector verification possible.
    pub fn compute_response_with_cnonce(
        &self,
        method: &str,
        uri: &str,
        challenge: &DigestChallenge,
        credentials: &Credentials,
        cnonce: &str,
    ) -> DigestCredentialResponse {
        let algorithm = challenge.algorithm;
        let nc = NonceCount::FIRST;

        let mut ha1 = hex_digest(
            algorithm,
            &[&credentials.username, &challenge.realm, &credentials.password],
        );
        if algorithm.is_session() {
            ha1 = hex_digest(algorithm, &[&ha1, &challenge.nonce, cnonce]);
        }
        let ha2 = hex_digest(algorithm, &[method, uri]);
        let nc_text = nc.to_string();

        let response = hex_digest(
            algorithm,
            &[&ha1, &challenge.nonce, &nc_text, cnonce, &challenge.qop, &ha2],
        );

        DigestCredentialResponse {
            username: credentials.username.clone(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: uri.to_string(),
            qop: challenge.qop.clone(),
            nc,
            cnonce: cnonce.to_string(),
            response,
            opaque: challenge.opaque.clone(),
            algorithm: challenge.algorithm_explicit.then_some(algorithm),
        }
    }
}

/// 128 random bits, hex encoded.
fn generate_cnonce() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

/// Lower-case hex digest of the colon-joined parts.
fn hex_digest(algorithm: DigestAlgorithm, parts: &[&str]) -> String {
    match algorithm {
        DigestAlgorithm::Md5 | DigestAlgorithm::Md5Sess => joined_digest::<Md5>(parts),
        DigestAlgorithm::Sha256 | DigestAlgorithm::Sha256Sess => joined_digest::<Sha256>(parts),
    }
}

fn joined_digest<D: Digest>(parts: &[&str]) -> String {
    let mut hasher = D::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b":");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn quote_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const DEVICE_CHALLENGE: &str = r#"Digest realm="AXIS_ACCC8E123456", nonce="abc123", qop="auth""#;
    const PARAM_LIST_URI: &str = "/axis-cgi/param.cgi?action=list";

    fn device_credentials() -> Credentials {
        Credentials::new("10.176.13.98", "root", "pass")
    }

    #[test]
    fn test_hex_digest_of_empty_input() {
        assert_eq!(
            hex_digest(DigestAlgorithm::Md5, &[""]),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn test_golden_vector_md5() {
        let challenge = DigestChallenge::parse(DEVICE_CHALLENGE).unwrap();
        let response = DigestAuthenticator::new().compute_response_with_cnonce(
            "GET",
            PARAM_LIST_URI,
            &challenge,
            &device_credentials(),
            "deadbeef",
        );

        // HA1 = 7b44406c796de5fe25691e2f74a1657a, HA2 = a72b12f55ef6135a9435d83a008e6107
        assert_eq!(response.response, "ad9a87405d862761e95ad29ee1955fe9");
        assert_eq!(response.nc.to_string(), "00000001");
        assert_eq!(response.cnonce, "deadbeef");
        assert_eq!(response.uri, PARAM_LIST_URI);
        assert_eq!(response.algorithm, None);
    }

    #[test]
    fn test_golden_vector_sha256() {
        let challenge = DigestChallenge::parse(
            r#"Digest realm="AXIS_ACCC8E123456", nonce="abc123", qop="auth", algorithm=SHA-256"#,
        )
        .unwrap();
        let response = DigestAuthenticator::new().compute_response_with_cnonce(
            "GET",
            PARAM_LIST_URI,
            &challenge,
            &device_credentials(),
            "deadbeef",
        );

        assert_eq!(
            response.response,
            "37e59fbd6338ad62cac6d1f6e28b2a647cb24e80d8d8d3697be2bb0f936f9e2f"
        );
        assert_eq!(response.algorithm, Some(DigestAlgorithm::Sha256));
    }

    #[test]
    fn test_golden_vector_md5_sess() {
        let challenge = DigestChallenge::parse(
            r#"Digest realm="AXIS_ACCC8E123456", nonce="abc123", qop="auth", algorithm=MD5-sess"#,
        )
        .unwrap();
        let response = DigestAuthenticator::new().compute_response_with_cnonce(
            "GET",
            PARAM_LIST_URI,
            &challenge,
            &device_credentials(),
            "deadbeef",
        );

        assert_eq!(response.response, "c28cf5d19b6c3e51a98a419211185fdc");
    }

    #[test]
    fn test_fresh_cnonce_per_call() {
        let challenge = DigestChallenge::parse(DEVICE_CHALLENGE).unwrap();
        let authenticator = DigestAuthenticator::new();
        let first =
            authenticator.compute_response("GET", PARAM_LIST_URI, &challenge, &device_credentials());
        let second =
            authenticator.compute_response("GET", PARAM_LIST_URI, &challenge, &device_credentials());

        assert_eq!(first.cnonce.len(), 32);
        assert_ne!(first.cnonce, second.cnonce);
        assert_ne!(first.response, second.response);
    }

    #[test]
    fn test_header_value_layout() {
        let challenge = DigestChallenge::parse(
            r#"Digest realm="r", nonce="n", qop="auth", opaque="op", algorithm=MD5"#,
        )
        .unwrap();
        let header = DigestAuthenticator::new()
            .compute_response_with_cnonce("POST", "/x", &challenge, &device_credentials(), "c")
            .to_header_value();

        assert!(header.starts_with(r#"Digest username="root", realm="r", nonce="n", uri="/x""#));
        assert!(header.contains("qop=auth, nc=00000001, cnonce=\"c\""));
        assert!(header.ends_with(r#", opaque="op", algorithm=MD5"#));
    }

    #[test]
    fn test_header_omits_absent_opaque() {
        let challenge = DigestChallenge::parse(DEVICE_CHALLENGE).unwrap();
        let header = DigestAuthenticator::new()
            .compute_response_with_cnonce("GET", "/", &challenge, &device_credentials(), "c")
            .to_header_value();

        assert!(!header.contains("opaque"));
        assert!(!header.contains("algorithm"));
    }

    #[test]
    fn test_nonce_count_formatting() {
        assert_eq!(NonceCount::FIRST.to_string(), "00000001");
        assert_eq!(NonceCount::FIRST.next().to_string(), "00000002");
        assert_eq!(NonceCount(0xabc).to_string(), "00000abc");
    }

    #[test]
    fn test_missing_nonce_fails_from_header() {
        let result = DigestAuthenticator::new().compute_response_from_header(
            "GET",
            "/",
            r#"Digest realm="r", qop="auth""#,
            &device_credentials(),
        );
        assert!(matches!(result, Err(AuthError::UnsupportedChallenge { .. })));
    }

    proptest! {
        #[test]
        fn prop_challenge_without_nonce_is_unsupported(
            realm in "[A-Za-z0-9_]{1,24}",
            opaque in proptest::option::of("[a-f0-9]{1,16}"),
        ) {
            let mut header = format!(r#"Digest realm="{realm}", qop="auth""#);
            if let Some(opaque) = opaque {
                header.push_str(&format!(r#", opaque="{opaque}""#));
            }
            let result = DigestAuthenticator::new().compute_response_from_header(
                "GET", "/", &header, &device_credentials(),
            );
            let is_unsupported = matches!(result, Err(AuthError::UnsupportedChallenge { .. }));
            prop_assert!(is_unsupported);
        }

        #[test]
        fn prop_response_is_deterministic_for_fixed_cnonce(
            nonce in "[A-Za-z0-9]{1,32}",
            cnonce in "[a-f0-9]{8,32}",
            uri in "/[a-z0-9/._?=&-]{0,40}",
            method in prop_oneof![Just("GET"), Just("POST")],
        ) {
            let challenge = DigestChallenge::parse(
                &format!(r#"Digest realm="lan", nonce="{nonce}", qop="auth""#),
            ).unwrap();
            let authenticator = DigestAuthenticator::new();
            let credentials = device_credentials();

            let first = authenticator
                .compute_response_with_cnonce(method, &uri, &challenge, &credentials, &cnonce);
            let second = authenticator
                .compute_response_with_cnonce(method, &uri, &challenge, &credentials, &cnonce);

            let ha1 = hex_digest(DigestAlgorithm::Md5, &["root", "lan", "pass"]);
            let ha2 = hex_digest(DigestAlgorithm::Md5, &[method, &uri]);
            let expected = hex_digest(
                DigestAlgorithm::Md5,
                &[&ha1, &nonce, "00000001", &cnonce, "auth", &ha2],
            );

            prop_assert_eq!(&first.response, &second.response);
            prop_assert_eq!(first.response, expected);
        }
    }
}

//! `WWW-Authenticate: Digest ...` challenge parsing.

use std::collections::HashMap;

use super::AuthError;

/// Hash algorithm requested by a Digest challenge (RFC 7616 names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestAlgorithm {
    #[default]
    Md5,
    Md5Sess,
    Sha256,
    Sha256Sess,
}

impl DigestAlgorithm {
    /// Parses the `algorithm` directive, case-insensitively.
    pub fn from_directive(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "MD5" => Some(Self::Md5),
            "MD5-SESS" => Some(Self::Md5Sess),
            "SHA-256" => Some(Self::Sha256),
            "SHA-256-SESS" => Some(Self::Sha256Sess),
            _ => None,
        }
    }

    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
            Self::Sha256 => "SHA-256",
            Self::Sha256Sess => "SHA-256-sess",
        }
    }

    /// Session variants fold the nonces into HA1.
    pub fn is_session(self) -> bool {
        matches!(self, Self::Md5Sess | Self::Sha256Sess)
    }
}

/// Parameters of one Digest challenge.
///
/// Lives for a single authentication round-trip. `realm` and `nonce` are
/// required; a challenge must also offer `qop=auth` because only the
/// qop variant of the response computation is supported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    /// Always `"auth"`; other protection qualities are rejected at parse time.
    pub qop: String,
    pub opaque: Option<String>,
    pub algorithm: DigestAlgorithm,
    /// Whether the server named the algorithm explicitly (echoed back if so).
    pub algorithm_explicit: bool,
}

impl DigestChallenge {
    /// Parses a `WWW-Authenticate` header value.
    ///
    /// # Errors
    ///
    /// - `AuthError::UnsupportedChallenge` - scheme is not Digest, or `realm`,
    ///   `nonce` or `qop=auth` is missing, or the algorithm is unknown
    pub fn parse(header: &str) -> Result<Self, AuthError> {
        let header = header.trim();
        let params = match split_scheme(header) {
            Some(("digest", rest)) => parse_params(rest),
            _ => return Err(AuthError::unsupported("challenge is not a Digest challenge")),
        };

        let nonce = params
            .get("nonce")
            .filter(|value| !value.is_empty())
            .cloned()
            .ok_or_else(|| AuthError::unsupported("challenge has no nonce"))?;

        let realm = params
            .get("realm")
            .cloned()
            .ok_or_else(|| AuthError::unsupported("challenge has no realm"))?;

        let qop_offer = params
            .get("qop")
            .ok_or_else(|| AuthError::unsupported("challenge has no qop"))?;
        if !qop_offer
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("auth"))
        {
            return Err(AuthError::unsupported(format!(
                "challenge offers qop \"{qop_offer}\" without \"auth\""
            )));
        }

        let (algorithm, algorithm_explicit) = match params.get("algorithm") {
            Some(name) => (
                DigestAlgorithm::from_directive(name).ok_or_else(|| {
                    AuthError::unsupported(format!("unknown digest algorithm \"{name}\""))
                })?,
                true,
            ),
            None => (DigestAlgorithm::Md5, false),
        };

        Ok(Self {
            realm,
            nonce,
            qop: "auth".to_string(),
            opaque: params.get("opaque").cloned(),
            algorithm,
            algorithm_explicit,
        })
    }
}

/// Returns whether a `WWW-Authenticate` value advertises the Digest scheme.
pub fn advertises_digest(header: &str) -> bool {
    matches!(split_scheme(header.trim()), Some(("digest", _)))
}

fn split_scheme(header: &str) -> Option<(&'static str, &str)> {
    let (scheme, rest) = header.split_once(char::is_whitespace).unwrap_or((header, ""));
    if scheme.eq_ignore_ascii_case("digest") {
        Some(("digest", rest))
    } else {
        None
    }
}

/// Splits `key=value, key="quoted, value"` pairs; keys are lower-cased.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && *c != ',') {
            key.push(c);
        }
        let key = key.trim().to_ascii_lowercase();

        if chars.next_if_eq(&'=').is_none() {
            if chars.peek().is_none() {
                break;
            }
            continue;
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    other => value.push(other),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value = value.trim().to_string();
        }

        if !key.is_empty() {
            params.insert(key, value);
        }
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_challenge() {
        let challenge = DigestChallenge::parse(
            r#"Digest realm="AXIS_ACCC8E123456", nonce="abc123", algorithm=MD5, qop="auth""#,
        )
        .unwrap();

        assert_eq!(challenge.realm, "AXIS_ACCC8E123456");
        assert_eq!(challenge.nonce, "abc123");
        assert_eq!(challenge.qop, "auth");
        assert_eq!(challenge.algorithm, DigestAlgorithm::Md5);
        assert!(challenge.algorithm_explicit);
        assert_eq!(challenge.opaque, None);
    }

    #[test]
    fn test_quoted_qop_list_keeps_commas() {
        let challenge = DigestChallenge::parse(
            r#"Digest realm="r", qop="auth,auth-int", nonce="n", opaque="o,p""#,
        )
        .unwrap();

        assert_eq!(challenge.qop, "auth");
        assert_eq!(challenge.opaque.as_deref(), Some("o,p"));
    }

    #[test]
    fn test_unquoted_values_and_scheme_case() {
        let challenge =
            DigestChallenge::parse("digest realm=lan, nonce=xyz, qop=auth, algorithm=SHA-256")
                .unwrap();

        assert_eq!(challenge.realm, "lan");
        assert_eq!(challenge.nonce, "xyz");
        assert_eq!(challenge.algorithm, DigestAlgorithm::Sha256);
    }

    #[test]
    fn test_escaped_quote_in_realm() {
        let challenge =
            DigestChallenge::parse(r#"Digest realm="say \"hi\"", nonce="n", qop="auth""#).unwrap();
        assert_eq!(challenge.realm, r#"say "hi""#);
    }

    #[test]
    fn test_rejects_basic_scheme() {
        let result = DigestChallenge::parse(r#"Basic realm="device""#);
        assert!(matches!(result, Err(AuthError::UnsupportedChallenge { .. })));
    }

    #[test]
    fn test_rejects_missing_qop() {
        let result = DigestChallenge::parse(r#"Digest realm="r", nonce="n""#);
        assert!(matches!(result, Err(AuthError::UnsupportedChallenge { .. })));
    }

    #[test]
    fn test_rejects_missing_realm() {
        let result = DigestChallenge::parse(r#"Digest nonce="abc123", qop="auth""#);
        match result {
            Err(AuthError::UnsupportedChallenge { reason }) => assert!(reason.contains("realm")),
            other => panic!("expected unsupported challenge, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_auth_int_only() {
        let result = DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth-int""#);
        assert!(matches!(result, Err(AuthError::UnsupportedChallenge { .. })));
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let result =
            DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth", algorithm=MD4"#);
        assert!(matches!(result, Err(AuthError::UnsupportedChallenge { .. })));
    }

    #[test]
    fn test_advertises_digest() {
        assert!(advertises_digest(r#"Digest realm="r""#));
        assert!(advertises_digest("  DIGEST nonce=1"));
        assert!(!advertises_digest(r#"Basic realm="r""#));
        assert!(!advertises_digest(""));
    }
}

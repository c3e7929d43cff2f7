//! Target device identity and endpoint layout.
//!
//! A device is addressed by host (optionally `host:port`) and authenticated
//! with a username and password. The same credentials are used in two
//! independent ways: HTTP Digest for requests issued by this crate, and
//! basic credentials embedded in the transmit URL handed to the transcoder.

use std::fmt;

use serde::Deserialize;
use url::Url;

/// Path probed to verify connectivity and read audio decoder capabilities.
pub const DEFAULT_PROBE_PATH: &str =
    "/axis-cgi/param.cgi?action=list&group=Properties.Audio.Decoder";

/// Path accepting a length-bounded body of encoded audio.
pub const DEFAULT_TRANSMIT_PATH: &str = "/axis-cgi/audio/transmit.cgi";

/// Content type of a pre-encoded G.711 mu-law payload.
pub const RAW_MULAW_CONTENT_TYPE: &str = "audio/basic";

/// Host and login for one device.
///
/// Immutable once built; reconfiguring the target means building new
/// credentials and a new session manager.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Host name or address, optionally with `:port`
    #[serde(alias = "ip")]
    pub host: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Base URL for plain HTTP requests to the device.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.host)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Endpoint paths exposed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoints {
    /// Capability/connectivity probe (GET)
    pub probe_path: String,
    /// Audio ingestion endpoint (POST)
    pub transmit_path: String,
    /// Content type used when uploading pre-encoded payloads directly
    pub raw_content_type: String,
}

impl Default for DeviceEndpoints {
    fn default() -> Self {
        Self {
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            transmit_path: DEFAULT_TRANSMIT_PATH.to_string(),
            raw_content_type: RAW_MULAW_CONTENT_TYPE.to_string(),
        }
    }
}

/// Builds the transmit URL with basic credentials in its userinfo section.
///
/// Username and password are percent-encoded by the URL parser, so reserved
/// characters in the password survive the round trip to the transcoder.
///
/// # Errors
///
/// - `url::ParseError` - host or path do not form a valid HTTP URL
pub fn transmit_url_with_credentials(
    credentials: &Credentials,
    transmit_path: &str,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!("{}{}", credentials.base_url(), transmit_path))?;

    // Only fails for cannot-be-a-base URLs, which an http:// URL never is.
    let _ = url.set_username(&credentials.username);
    let _ = url.set_password(Some(&credentials.password));

    Ok(url)
}

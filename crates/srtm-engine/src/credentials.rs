//! Earthdata login credentials.

use crate::{Result, SrtmError};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;

/// HTTP Basic credentials, stored the way they are kept in the
/// configuration: `base64(username:password)`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    encoded: String,
}

impl Credentials {
    /// Encode a username and password.
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            encoded: STANDARD.encode(format!("{}:{}", username, password)),
        }
    }

    /// Wrap an already encoded credential string.
    ///
    /// Fails if the string is empty, is not valid base64, or does not
    /// decode to `username:password`.
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let credentials = Self {
            encoded: encoded.to_string(),
        };
        credentials.decode()?;
        Ok(credentials)
    }

    /// The stored `base64(username:password)` string.
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Value for the `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("Basic {}", self.encoded)
    }

    /// The decoded username.
    pub fn username(&self) -> Result<String> {
        Ok(self.decode()?.0)
    }

    fn decode(&self) -> Result<(String, String)> {
        let bytes = STANDARD
            .decode(&self.encoded)
            .map_err(|e| SrtmError::Auth(format!("stored credentials are not base64: {}", e)))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| SrtmError::Auth("stored credentials are not UTF-8".to_string()))?;
        match text.split_once(':') {
            Some((user, pass)) if !user.is_empty() => Ok((user.to_string(), pass.to_string())),
            _ => Err(SrtmError::Auth(
                "stored credentials are not of the form username:password".to_string(),
            )),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username().unwrap_or_default())
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let creds = Credentials::new("Aladdin", "open sesame");
        assert_eq!(creds.encoded(), "QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
        assert_eq!(creds.header_value(), "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ==");
        assert_eq!(creds.username().unwrap(), "Aladdin");
    }

    #[test]
    fn test_from_encoded() {
        let creds = Credentials::from_encoded(" QWxhZGRpbjpvcGVuIHNlc2FtZQ==\n").unwrap();
        assert_eq!(creds, Credentials::new("Aladdin", "open sesame"));
    }

    #[test]
    fn test_password_may_contain_colon() {
        let creds = Credentials::new("user", "a:b:c");
        let back = Credentials::from_encoded(creds.encoded()).unwrap();
        assert_eq!(back.decode().unwrap().1, "a:b:c");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Credentials::from_encoded("").is_err());
        assert!(Credentials::from_encoded("not base64!").is_err());
        // "nocolon"
        assert!(Credentials::from_encoded("bm9jb2xvbg==").is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("someone", "hunter2");
        let text = format!("{:?}", creds);
        assert!(text.contains("someone"));
        assert!(!text.contains("hunter2"));
        assert!(!text.contains(creds.encoded()));
    }
}

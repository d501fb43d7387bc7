use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::result::Error;

/// Length of a device token on the wire.
pub const TOKEN_LENGTH: usize = 32;

/// A 32-byte APNS device token.
///
/// Tokens are accepted as hex strings the way clients tend to paste them:
/// case-insensitive, optionally with embedded spaces. Anything that does not
/// strip down to 64 hex digits fails with [`Error::InvalidToken`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceToken([u8; TOKEN_LENGTH]);

impl DeviceToken {
    pub fn from_bytes(bytes: [u8; TOKEN_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; TOKEN_LENGTH] {
        &self.0
    }

    /// Lowercase hex rendition, the form the feedback service reports.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for DeviceToken {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes = hex::decode(&stripped).map_err(|_| Error::InvalidToken(s.into()))?;
        let bytes: [u8; TOKEN_LENGTH] = bytes
            .try_into()
            .map_err(|_| Error::InvalidToken(s.into()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for DeviceToken {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeviceToken> for String {
    fn from(token: DeviceToken) -> Self {
        token.to_hex()
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeviceToken").field(&self.to_hex()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "e6e9cf3d0405ee61eac9552a5a17bff62a64a131d03a2e1638d06c25e105c1e5";

    #[test]
    fn parses_plain_hex() {
        let token: DeviceToken = TOKEN.parse().unwrap();
        assert_eq!(token.to_hex(), TOKEN);
    }

    #[test]
    fn strips_spaces_and_case() {
        let spaced =
            "E6E9 CF3D 0405 EE61 EAC9 552A 5A17 BFF6 2A64 A131 D03A 2E16 38D0 6C25 E105 C1E5";
        let token: DeviceToken = spaced.parse().unwrap();
        assert_eq!(token.to_hex(), TOKEN);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(matches!(
            "zz".repeat(32).parse::<DeviceToken>(),
            Err(Error::InvalidToken(_))
        ));
    }

    #[test]
    fn rejects_short_tokens() {
        assert!(matches!(
            "deadbeef".parse::<DeviceToken>(),
            Err(Error::InvalidToken(_))
        ));
    }

    #[test]
    fn serde_round_trips_as_hex() {
        let token: DeviceToken = TOKEN.parse().unwrap();
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{TOKEN}\""));
        let back: DeviceToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}

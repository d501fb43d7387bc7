use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Status byte of an APNS error response.
///
/// The table is Apple's, reproduced code for code. Codes outside the table
/// are preserved as [`Status::Unknown`] rather than collapsed, so a log
/// drained long after the fact still carries what the gateway actually sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    NoErrors,
    ProcessingError,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Shutdown,
    None,
    Unknown(u8),
}

impl Status {
    pub fn code(&self) -> u8 {
        match self {
            Self::NoErrors => 0,
            Self::ProcessingError => 1,
            Self::MissingDeviceToken => 2,
            Self::MissingTopic => 3,
            Self::MissingPayload => 4,
            Self::InvalidTokenSize => 5,
            Self::InvalidTopicSize => 6,
            Self::InvalidPayloadSize => 7,
            Self::InvalidToken => 8,
            Self::Shutdown => 10,
            Self::None => 255,
            Self::Unknown(code) => *code,
        }
    }
}

impl From<u8> for Status {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::NoErrors,
            1 => Self::ProcessingError,
            2 => Self::MissingDeviceToken,
            3 => Self::MissingTopic,
            4 => Self::MissingPayload,
            5 => Self::InvalidTokenSize,
            6 => Self::InvalidTopicSize,
            7 => Self::InvalidPayloadSize,
            8 => Self::InvalidToken,
            10 => Self::Shutdown,
            255 => Self::None,
            code => Self::Unknown(code),
        }
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.code()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoErrors => f.write_str("No errors encountered"),
            Self::ProcessingError => f.write_str("Processing error"),
            Self::MissingDeviceToken => f.write_str("Missing device token"),
            Self::MissingTopic => f.write_str("Missing topic"),
            Self::MissingPayload => f.write_str("Missing payload"),
            Self::InvalidTokenSize => f.write_str("Invalid token size"),
            Self::InvalidTopicSize => f.write_str("Invalid topic size"),
            Self::InvalidPayloadSize => f.write_str("Invalid payload size"),
            Self::InvalidToken => f.write_str("Invalid token"),
            Self::Shutdown => f.write_str("Shutdown"),
            Self::None => f.write_str("None (unknown)"),
            Self::Unknown(code) => write!(f, "Unknown ({code})"),
        }
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Self::from(u8::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in 0..=u8::MAX {
            assert_eq!(Status::from(code).code(), code);
        }
    }

    #[test]
    fn unlisted_codes_are_preserved() {
        assert_eq!(Status::from(9), Status::Unknown(9));
        assert_eq!(Status::from(9).to_string(), "Unknown (9)");
        assert_eq!(Status::from(10), Status::Shutdown);
        assert_eq!(Status::from(255), Status::None);
    }

    #[test]
    fn serializes_as_raw_code() {
        assert_eq!(serde_json::to_string(&Status::InvalidToken).unwrap(), "8");
        let status: Status = serde_json::from_str("10").unwrap();
        assert_eq!(status, Status::Shutdown);
    }
}

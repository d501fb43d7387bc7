use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, TimestampSeconds};
use time::OffsetDateTime;

use crate::notification::Notification;
use crate::result::{Error, Result};
use crate::status::Status;
use crate::token::{DeviceToken, TOKEN_LENGTH};

/// Enhanced notification command byte.
pub const ENHANCED_COMMAND: u8 = 1;

/// Error response command byte.
pub const ERROR_COMMAND: u8 = 8;

/// Payload size limit of the binary gateway.
pub const PAYLOAD_SIZE_LIMIT: usize = 256;

/// An error response is always exactly six bytes.
pub const ERROR_FRAME_LENGTH: usize = 6;

/// A feedback record is `u32 timestamp + u16 length + 32-byte token`.
pub const FEEDBACK_RECORD_LENGTH: usize = 38;

/// Appends one Enhanced Notification frame (command 1) to `buf`.
///
/// Layout, big-endian, no padding: command, 32-bit identifier, expiry,
/// token length, raw token, payload length, compact JSON payload.
pub fn encode_notification(
    buf: &mut Vec<u8>,
    identifier: u16,
    notification: &Notification,
) -> Result<()> {
    let payload = serde_json::to_vec(&notification.payload)?;
    if payload.len() > PAYLOAD_SIZE_LIMIT {
        return Err(Error::PayloadTooLarge {
            size: payload.len(),
            limit: PAYLOAD_SIZE_LIMIT,
        });
    }

    buf.put_u8(ENHANCED_COMMAND);
    buf.put_u32(identifier as u32);
    buf.put_u32(notification.expiry);
    buf.put_u16(TOKEN_LENGTH as u16);
    buf.put_slice(notification.token.as_bytes());
    buf.put_u16(payload.len() as u16);
    buf.put_slice(&payload);

    Ok(())
}

/// The six-byte error response the gateway sends before closing a
/// connection that rejected a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorFrame {
    pub status: Status,
    pub identifier: u32,
}

impl ErrorFrame {
    /// Decodes an error response. Anything other than six bytes starting
    /// with command 8 is malformed.
    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ERROR_FRAME_LENGTH || bytes[0] != ERROR_COMMAND {
            return Err(Error::MalformedErrorFrame(bytes.len()));
        }
        bytes.advance(1);
        let status = Status::from(bytes.get_u8());
        let identifier = bytes.get_u32();
        Ok(Self { status, identifier })
    }

    pub fn encode(&self) -> [u8; ERROR_FRAME_LENGTH] {
        let mut buf = [0u8; ERROR_FRAME_LENGTH];
        buf[0] = ERROR_COMMAND;
        buf[1] = self.status.code();
        buf[2..].copy_from_slice(&self.identifier.to_be_bytes());
        buf
    }
}

/// One record from the feedback service: the moment Apple decided a device
/// token went dark, and the token itself.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedbackTuple {
    #[serde_as(as = "TimestampSeconds<f64>")]
    pub timestamp: OffsetDateTime,
    pub token: DeviceToken,
}

/// Parses a drained feedback stream into tuples.
///
/// The stream is a concatenation of 38-byte records until EOF; a trailing
/// partial record or a record whose embedded token length is not 32 fails
/// with [`Error::MalformedFeedback`].
pub fn decode_feedback(bytes: &[u8]) -> Result<Vec<FeedbackTuple>> {
    if bytes.len() % FEEDBACK_RECORD_LENGTH != 0 {
        return Err(Error::MalformedFeedback);
    }

    let mut tuples = Vec::with_capacity(bytes.len() / FEEDBACK_RECORD_LENGTH);
    let mut buf = bytes;
    while buf.has_remaining() {
        let timestamp = buf.get_u32();
        let token_length = buf.get_u16();
        if token_length as usize != TOKEN_LENGTH {
            return Err(Error::MalformedFeedback);
        }
        let mut token = [0u8; TOKEN_LENGTH];
        buf.copy_to_slice(&mut token);

        let timestamp = OffsetDateTime::from_unix_timestamp(timestamp as i64)
            .map_err(|_| Error::MalformedFeedback)?;
        tuples.push(FeedbackTuple {
            timestamp,
            token: DeviceToken::from_bytes(token),
        });
    }

    Ok(tuples)
}

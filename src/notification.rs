use serde::{Deserialize, Serialize};

use crate::token::DeviceToken;

/// A single notification bound for the binary gateway.
///
/// `identifier` is the caller's opaque handle for the notification; the
/// session assigns its own 16-bit identifier before framing and uses it to
/// attribute error responses. `expiry` is UNIX seconds: non-zero asks Apple
/// to retry delivery until that time, zero means deliver once and drop.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Notification {
    pub token: DeviceToken,
    pub payload: serde_json::Value,
    pub expiry: u32,
    pub identifier: String,
}

impl Notification {
    pub fn new(
        token: DeviceToken,
        payload: serde_json::Value,
        expiry: u32,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            token,
            payload,
            expiry,
            identifier: identifier.into(),
        }
    }
}

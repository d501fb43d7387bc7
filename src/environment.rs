use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_plain::derive_display_from_serialize;

use crate::result::Error;

pub const GATEWAY_PORT: u16 = 2195;
pub const FEEDBACK_PORT: u16 = 2196;

const GATEWAY_SERVER: &str = "gateway.push.apple.com";
const GATEWAY_SANDBOX_SERVER: &str = "gateway.sandbox.push.apple.com";
const FEEDBACK_SERVER: &str = "feedback.push.apple.com";
const FEEDBACK_SANDBOX_SERVER: &str = "feedback.sandbox.push.apple.com";

/// Apple Push Notification service environment.
///
/// Apps provisioned under the same name but different environments are
/// disjoint: they hold separate certificates, sessions and logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    /// Host and port of the binary notification gateway.
    pub fn gateway_addr(&self) -> (&'static str, u16) {
        match self {
            Self::Production => (GATEWAY_SERVER, GATEWAY_PORT),
            Self::Sandbox => (GATEWAY_SANDBOX_SERVER, GATEWAY_PORT),
        }
    }

    /// Host and port of the feedback service.
    pub fn feedback_addr(&self) -> (&'static str, u16) {
        match self {
            Self::Production => (FEEDBACK_SERVER, FEEDBACK_PORT),
            Self::Sandbox => (FEEDBACK_SANDBOX_SERVER, FEEDBACK_PORT),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::Production
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("production") {
            Ok(Self::Production)
        } else if s.eq_ignore_ascii_case("sandbox") {
            Ok(Self::Sandbox)
        } else {
            Err(Error::InvalidEnvironment(s.into()))
        }
    }
}

derive_display_from_serialize!(Environment);

#![doc = include_str!("../README.md")]

pub mod certificate;
pub mod codec;
pub mod dialer;
pub mod disconnection;
pub mod environment;
pub mod feedback;
pub mod gateway;
pub mod notification;
pub mod registry;
pub mod result;
pub mod ring;
pub mod session;
pub mod status;
pub mod token;

pub use certificate::Certificate;
pub use codec::{ErrorFrame, FeedbackTuple};
pub use dialer::{Connect, TlsDialer};
pub use disconnection::{DisconnectionEvent, DisconnectionLog};
pub use environment::Environment;
pub use gateway::Gateway;
pub use notification::Notification;
pub use registry::{App, AppDescriptor, Registry};
pub use result::{Error, Result};
pub use session::{SendHandle, Session, SessionConfig, SessionHandle};
pub use status::Status;
pub use token::DeviceToken;

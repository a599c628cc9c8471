pub mod client;
pub mod error;
pub mod media;
pub mod protocol;
pub mod session;
pub mod transport;

pub use client::{Client, ClientConfig, SessionReport};
pub use error::{Result, RtspError};
pub use media::{ReceiveStats, RtpFrame, RtpPacket};
pub use session::transport::{Cast, TransportMode};
pub use session::{Closure, PlaybackCommand, PlaybackCursor, SessionState};

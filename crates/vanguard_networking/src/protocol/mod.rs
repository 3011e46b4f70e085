//! # Wire Protocol
//!
//! Every datagram is one [`Message`]: a 16-byte [`MessageHeader`] followed by
//! `payload_size` bytes whose layout depends on the event. Decoding never
//! panics; every malformed input maps to a [`ProtocolError`](crate::ProtocolError).

mod events;
mod message;
pub mod payloads;

pub use events::{GameEvent, Reliability};
pub use message::{Message, MessageHeader};
pub use payloads::{
    ChatMessage, ComponentPacket, Credentials, InputPacket, LobbyJoined, LobbySummary,
    LoginReply, NotAuthorized, Payload, PlayerInfo, RoomsList, ScoreUpdate, VoiceFrame,
};

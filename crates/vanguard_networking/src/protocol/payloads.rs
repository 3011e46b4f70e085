//! # Payload Layouts
//!
//! ```text
//! Credentials      [len u32][username][len u32][password]
//! LoginReply       [id u32][len u32][token]
//! RoomsList        [count u32]([id u32][len u32][name][players u32][max u32][in_game u8])*
//! LobbyJoined      [lobby u32][len u32][name][host u32][count u32]([id u32][len u32][name][ready u8])*
//! NotAuthorized    [required u8][current u8][len u32][prompt]
//! ComponentPacket  [guid u64][type u32][len u32][payload]
//! InputPacket      [tick u32][actions u32]
//! ScoreUpdate      [guid u64][score i32]
//! ```

use vanguard_core::{ComponentTypeId, WireReader, WireWriter};
use vanguard_shared::InputSnapshot;

use crate::session::SessionState;

/// A value that can be carried as a message payload.
pub trait Payload: Sized {
    /// Appends the wire form.
    fn write(&self, writer: &mut WireWriter);

    /// Reads the wire form, `None` if malformed.
    fn read(reader: &mut WireReader<'_>) -> Option<Self>;
}

impl Payload for u32 {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u32(*self);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        reader.read_u32()
    }
}

impl Payload for u64 {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u64(*self);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        reader.read_u64()
    }
}

impl Payload for String {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_str(self);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        reader.read_string()
    }
}

impl Payload for Vec<u8> {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_bytes(self);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        reader.read_bytes().map(<[u8]>::to_vec)
    }
}

/// Username and password, for `C_REGISTER` and `C_LOGIN`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Clear-text password; digested on arrival.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_owned(),
            password: password.to_owned(),
        }
    }
}

impl Payload for Credentials {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_str(&self.username);
        writer.write_str(&self.password);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            username: reader.read_string()?,
            password: reader.read_string()?,
        })
    }
}

/// Successful authentication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginReply {
    /// The connection id.
    pub id: u32,
    /// Token for a later `C_LOGIN_TOKEN`.
    pub token: String,
}

impl Payload for LoginReply {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u32(self.id);
        writer.write_str(&self.token);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            id: reader.read_u32()?,
            token: reader.read_string()?,
        })
    }
}

/// One row of `S_ROOMS_LIST`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LobbySummary {
    /// Lobby id.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Current occupants.
    pub players: u32,
    /// Capacity.
    pub max_players: u32,
    /// A match is running.
    pub in_game: bool,
}

impl Payload for LobbySummary {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u32(self.id);
        writer.write_str(&self.name);
        writer.write_u32(self.players);
        writer.write_u32(self.max_players);
        writer.write_bool(self.in_game);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            id: reader.read_u32()?,
            name: reader.read_string()?,
            players: reader.read_u32()?,
            max_players: reader.read_u32()?,
            in_game: reader.read_bool()?,
        })
    }
}

/// `S_ROOMS_LIST` payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoomsList(pub Vec<LobbySummary>);

impl Payload for RoomsList {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_len(self.0.len());
        for room in &self.0 {
            room.write(writer);
        }
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        let count = reader.read_len()?;
        let mut rooms = Vec::with_capacity(count);
        for _ in 0..count {
            rooms.push(LobbySummary::read(reader)?);
        }
        Some(Self(rooms))
    }
}

/// A lobby occupant as seen by the others.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerInfo {
    /// Connection id.
    pub id: u32,
    /// Account name.
    pub username: String,
    /// Ready to start.
    pub ready: bool,
}

impl Payload for PlayerInfo {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u32(self.id);
        writer.write_str(&self.username);
        writer.write_bool(self.ready);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            id: reader.read_u32()?,
            username: reader.read_string()?,
            ready: reader.read_bool()?,
        })
    }
}

/// `S_ROOM_JOINED` payload: the roster in join order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LobbyJoined {
    /// Lobby id.
    pub lobby_id: u32,
    /// Display name.
    pub name: String,
    /// Host connection id.
    pub host: u32,
    /// Occupants in join order, the joiner included.
    pub players: Vec<PlayerInfo>,
}

impl Payload for LobbyJoined {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u32(self.lobby_id);
        writer.write_str(&self.name);
        writer.write_u32(self.host);
        writer.write_len(self.players.len());
        for player in &self.players {
            player.write(writer);
        }
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        let lobby_id = reader.read_u32()?;
        let name = reader.read_string()?;
        let host = reader.read_u32()?;
        let count = reader.read_len()?;
        let mut players = Vec::with_capacity(count);
        for _ in 0..count {
            players.push(PlayerInfo::read(reader)?);
        }
        Some(Self {
            lobby_id,
            name,
            host,
            players,
        })
    }
}

/// `S_NOT_AUTHORIZED` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotAuthorized {
    /// State the request needs.
    pub required: SessionState,
    /// State the connection is in.
    pub current: SessionState,
    /// What the client should do next.
    pub prompt: String,
}

impl Payload for NotAuthorized {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u8(self.required as u8);
        writer.write_u8(self.current as u8);
        writer.write_str(&self.prompt);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            required: SessionState::from_u8(reader.read_u8()?)?,
            current: SessionState::from_u8(reader.read_u8()?)?,
            prompt: reader.read_string()?,
        })
    }
}

/// `S_TEAM_CHAT` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sender connection id.
    pub from: u32,
    /// Message text.
    pub text: String,
}

impl Payload for ChatMessage {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u32(self.from);
        writer.write_str(&self.text);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            from: reader.read_u32()?,
            text: reader.read_string()?,
        })
    }
}

/// `S_VOICE_RELAY` payload. The frame is opaque to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceFrame {
    /// Speaker connection id.
    pub from: u32,
    /// Encoded audio.
    pub data: Vec<u8>,
}

impl Payload for VoiceFrame {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u32(self.from);
        writer.write_bytes(&self.data);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            from: reader.read_u32()?,
            data: reader.read_bytes()?.to_vec(),
        })
    }
}

/// One component of one entity, the unit of replication.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentPacket {
    /// Network GUID of the entity.
    pub guid: u64,
    /// FNV-1a hash of the component name.
    pub component_type: ComponentTypeId,
    /// Component bytes.
    pub payload: Vec<u8>,
}

impl Payload for ComponentPacket {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u64(self.guid);
        writer.write_u32(self.component_type.0);
        writer.write_bytes(&self.payload);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            guid: reader.read_u64()?,
            component_type: ComponentTypeId(reader.read_u32()?),
            payload: reader.read_bytes()?.to_vec(),
        })
    }
}

/// `C_INPUT` payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputPacket {
    /// Client tick the input was sampled at.
    pub tick: u32,
    /// Held actions.
    pub input: InputSnapshot,
}

impl Payload for InputPacket {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u32(self.tick);
        writer.write_pod(&self.input);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            tick: reader.read_u32()?,
            input: reader.read_pod()?,
        })
    }
}

/// `S_SCORE_UPDATE` payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScoreUpdate {
    /// GUID of the scoring player's entity.
    pub guid: u64,
    /// Score after the change.
    pub score: i32,
}

impl Payload for ScoreUpdate {
    fn write(&self, writer: &mut WireWriter) {
        writer.write_u64(self.guid);
        writer.write_i32(self.score);
    }

    fn read(reader: &mut WireReader<'_>) -> Option<Self> {
        Some(Self {
            guid: reader.read_u64()?,
            score: reader.read_i32()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reencode<P: Payload>(value: &P) -> Option<P> {
        let mut writer = WireWriter::new();
        value.write(&mut writer);
        let bytes = writer.into_bytes();
        let mut reader = WireReader::new(&bytes);
        let decoded = P::read(&mut reader);
        assert!(reader.is_exhausted());
        decoded
    }

    #[test]
    fn test_component_packet_layout() {
        let packet = ComponentPacket {
            guid: 0x1122_3344_5566_7788,
            component_type: ComponentTypeId::from_name("Transform"),
            payload: vec![1, 2, 3],
        };
        let mut writer = WireWriter::new();
        packet.write(&mut writer);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 8 + 4 + 4 + 3);
        assert_eq!(&bytes[..8], &0x1122_3344_5566_7788u64.to_le_bytes());
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(&bytes[16..], &[1, 2, 3]);
    }

    #[test]
    fn test_roster_survives() {
        let joined = LobbyJoined {
            lobby_id: 3,
            name: "friday".into(),
            host: 1,
            players: vec![
                PlayerInfo {
                    id: 1,
                    username: "ada".into(),
                    ready: true,
                },
                PlayerInfo {
                    id: 2,
                    username: "bob".into(),
                    ready: false,
                },
            ],
        };
        assert_eq!(reencode(&joined), Some(joined));
        assert_eq!(reencode(&RoomsList::default()), Some(RoomsList::default()));
    }

    #[test]
    fn test_not_authorized_rejects_unknown_state() {
        let bytes = [200u8, 1, 0, 0, 0, 0];
        assert!(NotAuthorized::read(&mut WireReader::new(&bytes)).is_none());
        let refusal = NotAuthorized {
            required: SessionState::InGame,
            current: SessionState::InLobby,
            prompt: "wait for the match to start".into(),
        };
        assert_eq!(reencode(&refusal), Some(refusal));
    }

    #[test]
    fn test_score_update_keeps_negative_scores() {
        let update = ScoreUpdate {
            guid: 0xABCD,
            score: -15,
        };
        let mut writer = WireWriter::new();
        update.write(&mut writer);
        assert_eq!(writer.len(), 12);
        assert_eq!(reencode(&update), Some(update));
    }
}

//! Network identity component.

use super::component::Component;
use crate::memory::AssetCatalog;
use crate::wire::{Replicated, WireReader, WireWriter};

/// Cross-session identity of a replicated entity.
///
/// Local entity ids never leave the process; peers address an entity by its
/// `global_id` alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NetworkIdentity {
    /// Random 64-bit GUID, unique across the match.
    pub global_id: u64,
    /// Owning connection id. `0` means server-owned.
    pub owner: u32,
}

impl NetworkIdentity {
    /// Owner id of entities nobody controls.
    pub const SERVER_OWNER: u32 = 0;

    /// Creates a new identity.
    #[inline]
    #[must_use]
    pub const fn new(global_id: u64, owner: u32) -> Self {
        Self { global_id, owner }
    }

    /// Returns true if no client owns this entity.
    #[inline]
    #[must_use]
    pub const fn is_server_owned(self) -> bool {
        self.owner == Self::SERVER_OWNER
    }
}

impl Component for NetworkIdentity {
    const NAME: &'static str = "NetworkIdentity";
}

impl Replicated for NetworkIdentity {
    fn encode(&self, writer: &mut WireWriter, _assets: &dyn AssetCatalog) {
        writer.write_u64(self.global_id);
        writer.write_u32(self.owner);
    }

    fn decode(reader: &mut WireReader<'_>, _assets: &mut dyn AssetCatalog) -> Option<Self> {
        Some(Self {
            global_id: reader.read_u64()?,
            owner: reader.read_u32()?,
        })
    }
}

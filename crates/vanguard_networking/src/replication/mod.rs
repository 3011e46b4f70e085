//! # Replication
//!
//! ```text
//! SERVER                                        CLIENT
//! gameplay writes ─> dirty flags
//! ReplicationSender::collect                    ReplicationReceiver::apply
//!   destroy records  ─ S_ENTITY_DESTROY{guid} ─>   destroy local, remember guid
//!   dirty components ─ S_SNAPSHOT{guid,type,..}─>  guid -> local entity, decode
//! ```
//!
//! Local entity ids never leave a process. The wire speaks GUIDs from a
//! [`GuidSource`] and component type ids hashed from component names, so
//! peers need not agree on registration order.

mod guid;
mod receiver;
mod sender;

pub use guid::GuidSource;
pub use receiver::{Applied, ReplicationReceiver};
pub use sender::{ReplicationSender, ScopedMessage};

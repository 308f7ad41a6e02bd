//! Block gossip: periodic index broadcasts and pull-on-miss reconciliation.

pub mod channel;
pub mod content;
pub mod error;
pub mod index;
pub mod local;
pub mod message;
pub mod transport;

pub use channel::{BlockChannel, GossipConfig, GossipHandle};
pub use content::{BlockFetcher, ContentStore, FsContentStore, MaterializingFetcher, Uploader};
pub use error::{GossipError, Result};
pub use index::LocalIndex;
pub use local::{LocalNetwork, LocalTransport};
pub use message::{BlockIndexRecord, MessageKind, WireMessage};
pub use transport::{Subscription, TopicMessage, Transport};

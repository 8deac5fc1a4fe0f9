pub mod catalog;
pub mod channel;
pub mod definition;
pub mod rotation;
pub mod slice;
pub mod store;

pub use catalog::WordCatalog;
pub use channel::{BroadcastHistory, ChannelSlice, ChannelWord};
pub use definition::{CachedDefinition, Definition, Meaning, RawEntry};
pub use rotation::SubscriberState;
pub use slice::Slice;
pub use store::{Document, DocumentStore};

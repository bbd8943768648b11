//! # chatline-engine
//!
//! Event classification and state reconciliation.
//!
//! Inbound events are classified into a new message or a mutation signal
//! ([`classifier`]), completed with display names ([`names`]) and media
//! ([`media`]), applied to the canonical chat/message index ([`state`]),
//! mirrored to persistence ([`persist`]) and announced to live subscribers
//! ([`fanout`]). [`ingest::Engine`] wires these steps together.

pub mod classifier;
pub mod error;
pub mod events;
pub mod fanout;
pub mod ingest;
pub mod media;
pub mod names;
pub mod periodic;
pub mod persist;
pub mod state;

pub use classifier::{Classified, Classifier};
pub use error::EngineError;
pub use events::{Change, Envelope};
pub use fanout::{Broadcaster, Subscription};
pub use ingest::{Engine, MediaPipeline};
pub use media::{InlineFetch, MediaFetch};
pub use names::{NameLookup, NameResolver};
pub use periodic::PeriodicTask;
pub use persist::{Persistence, SqlitePersistence};
pub use state::{ChatMetadata, Insert, StateStore, StoreStats};

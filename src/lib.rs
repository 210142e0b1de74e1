mod board;
pub mod config;
mod content;
mod error;
mod journal;
pub mod ledger;
mod projection;
mod publisher;
mod record;
mod store;

pub use board::{Board, BoardBuilder};
pub use config::Config;
pub use content::{
    ContentData, ContentStore, DisplayData, Enricher, MemoryContentStore, NO_EXTERNAL_DATA,
};
pub use error::{BoardError, ConfigError, ContentError, RecordError, SubscriptionError};
pub use journal::{Journal, JournalRecords};
pub use ledger::{BlockRange, BlockTag, EventStream, Ledger, MemoryLedger};
pub use projection::{
    project, BoardViews, OpenBounty, Projection, ValidFulfilment, BOUNTY_DATA_FIELD,
    FULFILMENT_DATA_FIELD,
};
pub use publisher::{ViewPublisher, ViewSubscriber};
pub use record::{
    Amount, BountyEvent, BountyId, ContentRef, EventKind, EventRecord, FulfilmentId, RawEvent,
};
pub use store::{EventLogStore, LogEntry, LogSnapshot};

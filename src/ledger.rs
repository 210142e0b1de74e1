//! Ledger subscription interface and an in-memory ledger.

use crate::error::SubscriptionError;
use crate::record::{EventKind, RawEvent};
use futures::channel::mpsc;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Stream of raw events for one subscription.
pub type EventStream = BoxStream<'static, Result<RawEvent, SubscriptionError>>;

/// Upper end of a [`BlockRange`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Number(u64),
    /// Open-ended: replay history, then keep delivering live events.
    Latest,
}

/// Inclusive block range of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from_block: u64,
    pub to_block: BlockTag,
}

impl BlockRange {
    /// Everything from the first block on, including live events.
    pub fn from_genesis() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(from_block: u64) -> Self {
        BlockRange {
            from_block,
            to_block: BlockTag::Latest,
        }
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.from_block
            && match self.to_block {
                BlockTag::Number(to) => block <= to,
                BlockTag::Latest => true,
            }
    }

    pub fn is_open_ended(&self) -> bool {
        self.to_block == BlockTag::Latest
    }
}

/// Source of contract events.
///
/// One subscription per event kind. An open-ended range replays history
/// first and then continues with live events on the same stream. Error
/// items do not end the stream.
pub trait Ledger {
    fn subscribe(&self, kind: EventKind, range: BlockRange) -> EventStream;
}

/// A [`Ledger`] that keeps its history in memory.
///
/// Every emitted event is stamped with a block number (its own, if it
/// carries one, otherwise the next free block) and delivered to live
/// subscriptions whose range covers it. [`MemoryLedger::close`] ends all
/// open-ended streams.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<Mutex<LedgerInner>>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    history: Vec<Emitted>,
    next_block: u64,
    live: Vec<LiveSubscription>,
    closed: bool,
}

#[derive(Debug, Clone)]
struct Emitted {
    kind: EventKind,
    block: u64,
    item: Result<RawEvent, SubscriptionError>,
}

#[derive(Debug)]
struct LiveSubscription {
    kind: EventKind,
    range: BlockRange,
    tx: mpsc::UnboundedSender<Result<RawEvent, SubscriptionError>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emit an event and return the block it was stamped with.
    pub fn emit(&self, kind: EventKind, mut raw: RawEvent) -> u64 {
        let mut inner = self.lock();
        let block = raw.block_number.unwrap_or(inner.next_block);
        inner.next_block = inner.next_block.max(block + 1);
        raw.block_number = Some(block);
        inner.push(Emitted {
            kind,
            block,
            item: Ok(raw),
        });
        block
    }

    /// Emit an error item on the `kind` subscription.
    pub fn emit_error(&self, kind: EventKind, error: SubscriptionError) {
        let mut inner = self.lock();
        let block = inner.next_block;
        inner.push(Emitted {
            kind,
            block,
            item: Err(error),
        });
    }

    /// End every open-ended subscription. Later subscriptions only replay
    /// history.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.live.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerInner {
    fn push(&mut self, emitted: Emitted) {
        self.live.retain(|sub| {
            if sub.kind != emitted.kind || !sub.range.contains(emitted.block) {
                return true;
            }
            sub.tx.unbounded_send(emitted.item.clone()).is_ok()
        });
        self.history.push(emitted);
    }
}

impl Ledger for MemoryLedger {
    fn subscribe(&self, kind: EventKind, range: BlockRange) -> EventStream {
        let mut inner = self.lock();
        let replay: Vec<_> = inner
            .history
            .iter()
            .filter(|e| e.kind == kind && range.contains(e.block))
            .map(|e| e.item.clone())
            .collect();

        if inner.closed || !range.is_open_ended() {
            return stream::iter(replay).boxed();
        }

        let (tx, rx) = mpsc::unbounded();
        inner.live.push(LiveSubscription { kind, range, tx });
        stream::iter(replay).chain(rx).boxed()
    }
}

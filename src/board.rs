use crate::config::Config;
use crate::content::{ContentData, ContentStore, Enricher};
use crate::error::{BoardError, RecordError};
use crate::journal::Journal;
use crate::ledger::{BlockRange, Ledger};
use crate::projection::{project, BoardViews};
use crate::publisher::{ViewPublisher, ViewSubscriber};
use crate::record::{EventKind, EventRecord, RawEvent};
use crate::store::EventLogStore;
use futures::future::{self, BoxFuture, FutureExt};
use futures::stream::{self, FuturesOrdered, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Enrichment outcome for one appended record, tagged with its position.
type PendingPass = BoxFuture<'static, (usize, Option<ContentData>)>;

/// Newest block seen for one event kind, with the records delivered in it.
#[derive(Debug)]
struct KindCursor {
    block: u64,
    records: Vec<EventRecord>,
}

/// Builder for configuring a [`Board`] before opening it.
///
/// # Examples
///
/// ```
/// use bountyfold::{Board, MemoryContentStore};
/// use std::time::Duration;
///
/// let board = Board::builder()
///     .content_store(MemoryContentStore::new())
///     .enrich_timeout(Duration::from_secs(2))
///     .open()
///     .unwrap();
/// assert!(board.store().is_empty());
/// ```
#[must_use]
pub struct BoardBuilder {
    config: Config,
    content_store: Option<Arc<dyn ContentStore>>,
}

impl BoardBuilder {
    fn new() -> Self {
        BoardBuilder {
            config: Config::default(),
            content_store: None,
        }
    }

    /// Replace every setting with the values from `config`.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn content_store(self, store: impl ContentStore + 'static) -> Self {
        self.shared_content_store(Arc::new(store))
    }

    pub fn shared_content_store(mut self, store: Arc<dyn ContentStore>) -> Self {
        self.content_store = Some(store);
        self
    }

    pub fn enrich_timeout(mut self, timeout: Duration) -> Self {
        self.config.enrich_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn from_block(mut self, block: u64) -> Self {
        self.config.from_block = block;
        self
    }

    pub fn journal(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.journal_dir = Some(dir.into());
        self
    }

    /// Open the board.
    ///
    /// With a journal configured, every journaled record is restored into
    /// the log and queued for enrichment before anything new can be
    /// delivered.
    ///
    /// # Errors
    ///
    /// Returns [`BoardError::Journal`] if the journal cannot be opened
    /// (including when another board holds its lock) or read.
    pub fn open(self) -> Result<Board, BoardError> {
        let mut board = Board {
            store: EventLogStore::new(),
            enricher: Enricher::new(self.content_store, self.config.enrich_timeout()),
            publisher: ViewPublisher::new(),
            pending: FuturesOrdered::new(),
            journal: None,
            from_block: self.config.from_block,
            cursors: HashMap::new(),
        };

        if let Some(dir) = &self.config.journal_dir {
            let journal = Journal::open(dir)?;
            let records = journal.read_all()?;
            info!(
                "bountyfold: restoring {} records from {}",
                records.len(),
                journal.path().display()
            );
            for record in records {
                board.append_record(record);
            }
            board.journal = Some(journal);
        }

        Ok(board)
    }
}

/// The delivery pipeline: event log, enrichment, projection, publication.
///
/// Records are appended the moment they are delivered. Their content
/// lookups run concurrently, but projection passes complete strictly in
/// append order: the pass for position `n` waits for the lookup of `n`
/// (bounded by the enrichment timeout) and projects exactly the prefix
/// `0..=n`, even when a later lookup finishes first.
pub struct Board {
    store: EventLogStore,
    enricher: Enricher,
    publisher: ViewPublisher,
    pending: FuturesOrdered<PendingPass>,
    journal: Option<Journal>,
    from_block: u64,
    cursors: HashMap<EventKind, KindCursor>,
}

impl Board {
    pub fn builder() -> BoardBuilder {
        BoardBuilder::new()
    }

    /// Normalize and append one delivered event; return its log position.
    ///
    /// The projection pass for the event is queued, not run; drive it with
    /// [`Board::process_next`], [`Board::flush`] or [`Board::run`].
    ///
    /// A journal write failure is logged and does not reject the event. An
    /// event identical to one already delivered in the same block is
    /// appended to the log but not journaled again.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] for a malformed payload. Nothing is appended
    /// in that case.
    pub fn deliver(&mut self, kind: EventKind, raw: RawEvent) -> Result<usize, RecordError> {
        let record = EventRecord::from_raw(kind, &raw)?;
        let redelivered = self.already_delivered(&record);
        if let Some(journal) = &mut self.journal {
            if redelivered {
                debug!("bountyfold: {kind} event redelivered, not journaling it again");
            } else if let Err(e) = journal.append(&record) {
                error!("bountyfold: failed to journal {kind} event: {e}");
            }
        }
        Ok(self.append_record(record))
    }

    fn already_delivered(&self, record: &EventRecord) -> bool {
        self.cursors.get(&record.kind()).is_some_and(|cursor| {
            record.block_number == Some(cursor.block) && cursor.records.contains(record)
        })
    }

    fn append_record(&mut self, record: EventRecord) -> usize {
        if let Some(block) = record.block_number {
            let cursor = self.cursors.entry(record.kind()).or_insert(KindCursor {
                block,
                records: Vec::new(),
            });
            if block > cursor.block {
                cursor.block = block;
                cursor.records.clear();
            }
            if block == cursor.block {
                cursor.records.push(record.clone());
            }
        }
        let content = record.event.content().cloned();
        let position = self.store.append(record);

        let pass: PendingPass = match content {
            Some(content) => {
                let enricher = self.enricher.clone();
                async move { (position, Some(enricher.enrich(&content).await)) }.boxed()
            }
            None => future::ready((position, None)).boxed(),
        };
        self.pending.push_back(pass);
        position
    }

    /// Complete the oldest queued pass and return the views it published.
    ///
    /// Returns `None` when no pass is queued.
    pub async fn process_next(&mut self) -> Option<Arc<BoardViews>> {
        let (position, outcome) = self.pending.next().await?;
        Some(self.complete(position, outcome))
    }

    fn complete(&mut self, position: usize, outcome: Option<ContentData>) -> Arc<BoardViews> {
        if let Some(data) = outcome {
            self.store.record_enrichment(position, data);
        }
        let views = project(&self.store.snapshot_prefix(position + 1));
        debug!(
            "bountyfold: pass {}: {} open bounties, {} valid fulfilments",
            views.log_len,
            views.open_bounties.len(),
            views.valid_fulfilments.len()
        );
        self.publisher.publish(views)
    }

    /// Complete every queued pass and return the latest views.
    pub async fn flush(&mut self) -> Arc<BoardViews> {
        while self.process_next().await.is_some() {}
        self.views()
    }

    /// Subscribe to every event kind on `ledger` and process deliveries
    /// until all subscriptions end.
    ///
    /// Each kind's subscription starts at its own [`Board::resume_block`].
    /// Stream errors and malformed events are logged and skipped.
    pub async fn run<L: Ledger + ?Sized>(&mut self, ledger: &L) -> Arc<BoardViews> {
        let mut events = stream::select_all(EventKind::ALL.into_iter().map(|kind| {
            let range = BlockRange::starting_at(self.resume_block(kind));
            info!(
                "bountyfold: subscribing to {kind} events from block {}",
                range.from_block
            );
            ledger
                .subscribe(kind, range)
                .map(move |item| (kind, item))
        }));

        loop {
            tokio::select! {
                next = events.next() => match next {
                    Some((kind, Ok(raw))) => {
                        if let Err(e) = self.deliver(kind, raw) {
                            warn!("bountyfold: rejected {kind} event: {e}");
                        }
                    }
                    Some((kind, Err(e))) => {
                        warn!("bountyfold: {kind} subscription error: {e}");
                    }
                    None => break,
                },
                Some((position, outcome)) = self.pending.next(), if !self.pending.is_empty() => {
                    self.complete(position, outcome);
                }
            }
        }

        info!("bountyfold: ledger subscriptions ended");
        self.flush().await
    }

    /// Complete outstanding passes and release the journal.
    pub async fn shutdown(mut self) -> Arc<BoardViews> {
        let views = self.flush().await;
        if let Some(journal) = self.journal.take() {
            debug!("bountyfold: closing journal {}", journal.path().display());
        }
        views
    }

    /// Block the next [`Board::run`] subscribes to `kind` from: the
    /// configured start block or the newest `kind` block already in the log,
    /// whichever is later.
    ///
    /// Kinds are delivered independently, so the newest block of one kind
    /// says nothing about another. The newest block itself is delivered
    /// again; its events are absorbed by the projection and are not
    /// journaled twice.
    pub fn resume_block(&self, kind: EventKind) -> u64 {
        self.cursors
            .get(&kind)
            .map_or(self.from_block, |cursor| cursor.block.max(self.from_block))
    }

    pub fn views(&self) -> Arc<BoardViews> {
        self.publisher.latest()
    }

    pub fn subscribe(&self) -> ViewSubscriber {
        self.publisher.subscribe()
    }

    pub fn store(&self) -> &EventLogStore {
        &self.store
    }

    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    /// Number of passes queued but not yet published.
    pub fn pending_passes(&self) -> usize {
        self.pending.len()
    }
}

use crate::projection::BoardViews;
use std::sync::Arc;
use tokio::sync::watch;

/// Hands the latest [`BoardViews`] to the presentation layer.
///
/// Both views travel as one value, so a subscriber can never observe open
/// bounties from one log prefix next to fulfilments from another. Only the
/// latest value is kept; slow subscribers skip intermediate passes.
#[derive(Debug)]
pub struct ViewPublisher {
    tx: watch::Sender<Arc<BoardViews>>,
}

impl Default for ViewPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewPublisher {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Arc::new(BoardViews::default()));
        ViewPublisher { tx }
    }

    /// Publish `views` and return the shared handle subscribers will see.
    ///
    /// Views computed from a shorter log prefix than the current ones are
    /// dropped and the current views are returned instead.
    pub fn publish(&self, views: BoardViews) -> Arc<BoardViews> {
        self.tx.send_if_modified(|current| {
            if views.log_len < current.log_len {
                return false;
            }
            *current = Arc::new(views);
            true
        });
        self.latest()
    }

    pub fn latest(&self) -> Arc<BoardViews> {
        Arc::clone(&*self.tx.borrow())
    }

    pub fn subscribe(&self) -> ViewSubscriber {
        ViewSubscriber {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving half of a [`ViewPublisher`].
#[derive(Debug, Clone)]
pub struct ViewSubscriber {
    rx: watch::Receiver<Arc<BoardViews>>,
}

impl ViewSubscriber {
    /// Wait for the next publication.
    ///
    /// Returns `None` once the publisher has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<BoardViews>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&*self.rx.borrow_and_update()))
    }

    /// The most recently published views, without waiting.
    pub fn current(&self) -> Arc<BoardViews> {
        Arc::clone(&*self.rx.borrow())
    }
}

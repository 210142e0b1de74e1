use crate::content::{ContentData, DisplayData};
use crate::record::{Amount, BountyEvent, BountyId, ContentRef, EventRecord, FulfilmentId};
use crate::store::LogSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Member of a bounty's stored document holding its description.
pub const BOUNTY_DATA_FIELD: &str = "bountyData";

/// Member of a fulfilment's stored document holding its description.
pub const FULFILMENT_DATA_FIELD: &str = "fulfilmentData";

/// A bounty that has been issued and neither cancelled nor accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenBounty {
    pub bounty_id: BountyId,
    pub issuer: String,
    pub amount: Amount,
    pub content_ref: ContentRef,
    pub bounty_data: String,
    pub ipfs_data: String,
}

/// A fulfilment whose parent bounty is still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidFulfilment {
    pub bounty_id: BountyId,
    pub fulfilment_id: FulfilmentId,
    pub fulfiler: String,
    pub content_ref: ContentRef,
    pub fulfilment_data: String,
    pub ipfs_data: String,
}

/// Both derived views, computed from the same log prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardViews {
    pub open_bounties: Vec<OpenBounty>,
    pub valid_fulfilments: Vec<ValidFulfilment>,
    /// Number of log records these views were computed from.
    pub log_len: usize,
}

impl BoardViews {
    pub fn open_bounty(&self, bounty_id: BountyId) -> Option<&OpenBounty> {
        self.open_bounties.iter().find(|b| b.bounty_id == bounty_id)
    }

    pub fn is_open(&self, bounty_id: BountyId) -> bool {
        self.open_bounty(bounty_id).is_some()
    }

    pub fn fulfilments_of(&self, bounty_id: BountyId) -> impl Iterator<Item = &ValidFulfilment> {
        self.valid_fulfilments
            .iter()
            .filter(move |f| f.bounty_id == bounty_id)
    }
}

/// Fold state for the projection.
///
/// Records are applied in log order with [`Projection::apply`]; the views
/// are produced by [`Projection::finish`]. Duplicate deliveries are
/// resolved first-write-wins: a repeated issuance of a bounty, or a
/// repeated fulfilment with the same `(bounty_id, fulfilment_id)`, is
/// ignored. Closing events remove their bounty whether they arrive before
/// or after its issuance.
#[derive(Debug, Clone, Default)]
pub struct Projection {
    candidates: Vec<OpenBounty>,
    issued: HashSet<BountyId>,
    closed: HashSet<BountyId>,
    fulfilments: Vec<ValidFulfilment>,
    fulfilled: HashSet<(BountyId, FulfilmentId)>,
    applied: usize,
}

impl Projection {
    /// Fold one record into the state.
    ///
    /// `enrichment` is the lookup outcome for the record's content
    /// reference, if one is known yet.
    pub fn apply(mut self, record: &EventRecord, enrichment: Option<&ContentData>) -> Self {
        self.applied += 1;
        match &record.event {
            BountyEvent::Issuance {
                bounty_id,
                issuer,
                amount,
                content,
            } => {
                if self.issued.insert(*bounty_id) {
                    let display = DisplayData::resolve(content, enrichment, BOUNTY_DATA_FIELD);
                    self.candidates.push(OpenBounty {
                        bounty_id: *bounty_id,
                        issuer: issuer.clone(),
                        amount: *amount,
                        content_ref: content.clone(),
                        bounty_data: display.data,
                        ipfs_data: display.ipfs_data,
                    });
                }
            }
            BountyEvent::Cancellation { bounty_id, .. }
            | BountyEvent::Acceptance { bounty_id, .. } => {
                self.closed.insert(*bounty_id);
            }
            BountyEvent::Fulfilment {
                bounty_id,
                fulfilment_id,
                fulfiler,
                content,
            } => {
                if self.fulfilled.insert((*bounty_id, *fulfilment_id)) {
                    let display =
                        DisplayData::resolve(content, enrichment, FULFILMENT_DATA_FIELD);
                    self.fulfilments.push(ValidFulfilment {
                        bounty_id: *bounty_id,
                        fulfilment_id: *fulfilment_id,
                        fulfiler: fulfiler.clone(),
                        content_ref: content.clone(),
                        fulfilment_data: display.data,
                        ipfs_data: display.ipfs_data,
                    });
                }
            }
        }
        self
    }

    /// Produce the views for everything applied so far.
    pub fn finish(self) -> BoardViews {
        let open_bounties: Vec<OpenBounty> = self
            .candidates
            .into_iter()
            .filter(|b| !self.closed.contains(&b.bounty_id))
            .collect();
        let open: HashSet<BountyId> = open_bounties.iter().map(|b| b.bounty_id).collect();
        let valid_fulfilments = self
            .fulfilments
            .into_iter()
            .filter(|f| open.contains(&f.bounty_id))
            .collect();

        BoardViews {
            open_bounties,
            valid_fulfilments,
            log_len: self.applied,
        }
    }
}

/// Compute both views from a log snapshot.
///
/// Pure and total: the same snapshot always yields the same views.
///
/// # Examples
///
/// ```
/// use bountyfold::{project, Amount, BountyEvent, BountyId, EventRecord, LogSnapshot};
///
/// let log = LogSnapshot::from_records([
///     EventRecord::new(BountyEvent::Issuance {
///         bounty_id: BountyId(1),
///         issuer: "0xabc".into(),
///         amount: Amount(5),
///         content: "X".into(),
///     }),
///     EventRecord::new(BountyEvent::Cancellation {
///         bounty_id: BountyId(1),
///         issuer: None,
///     }),
/// ]);
///
/// let views = project(&log);
/// assert!(views.open_bounties.is_empty());
/// assert_eq!(views.log_len, 2);
/// ```
pub fn project(snapshot: &LogSnapshot) -> BoardViews {
    snapshot
        .entries()
        .iter()
        .fold(Projection::default(), |state, entry| {
            state.apply(&entry.record, entry.enrichment.as_ref())
        })
        .finish()
}

#![allow(dead_code)]

use bountyfold::{
    Amount, BoardViews, BountyEvent, BountyId, EventRecord, FulfilmentId, LogSnapshot, RawEvent,
};
use serde_json::json;

pub const CID_A: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
pub const CID_B: &str = "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o";
pub const CID_C: &str = "QmPZ9gcCEpqKTo6aq61g2nXGUhM4iCL3ewB6LDXZCtioEB";

pub const ISSUER: &str = "0x1111111111111111111111111111111111111111";
pub const FULFILER: &str = "0x2222222222222222222222222222222222222222";

pub fn issuance(bounty_id: u64, amount: u128, content: &str) -> EventRecord {
    EventRecord::new(BountyEvent::Issuance {
        bounty_id: BountyId(bounty_id),
        issuer: ISSUER.to_string(),
        amount: Amount(amount),
        content: content.into(),
    })
}

pub fn cancellation(bounty_id: u64) -> EventRecord {
    EventRecord::new(BountyEvent::Cancellation {
        bounty_id: BountyId(bounty_id),
        issuer: Some(ISSUER.to_string()),
    })
}

pub fn fulfilment(bounty_id: u64, fulfilment_id: u64, content: &str) -> EventRecord {
    EventRecord::new(BountyEvent::Fulfilment {
        bounty_id: BountyId(bounty_id),
        fulfilment_id: FulfilmentId(fulfilment_id),
        fulfiler: FULFILER.to_string(),
        content: content.into(),
    })
}

pub fn acceptance(bounty_id: u64, fulfilment_id: u64) -> EventRecord {
    EventRecord::new(BountyEvent::Acceptance {
        bounty_id: BountyId(bounty_id),
        fulfilment_id: FulfilmentId(fulfilment_id),
        issuer: Some(ISSUER.to_string()),
        fulfiler: Some(FULFILER.to_string()),
    })
}

pub fn raw_issuance(bounty_id: u64, amount: u128, data: &str) -> RawEvent {
    RawEvent::new(json!({
        "bounty_id": bounty_id.to_string(),
        "issuer": ISSUER,
        "amount": amount.to_string(),
        "data": data,
    }))
}

pub fn raw_cancellation(bounty_id: u64) -> RawEvent {
    RawEvent::new(json!({
        "bounty_id": bounty_id.to_string(),
        "issuer": ISSUER,
    }))
}

pub fn raw_fulfilment(bounty_id: u64, fulfilment_id: u64, data: &str) -> RawEvent {
    RawEvent::new(json!({
        "bounty_id": bounty_id.to_string(),
        "fulfillment_id": fulfilment_id.to_string(),
        "fulfiller": FULFILER,
        "data": data,
    }))
}

pub fn raw_acceptance(bounty_id: u64, fulfilment_id: u64) -> RawEvent {
    RawEvent::new(json!({
        "bounty_id": bounty_id.to_string(),
        "fulfillment_id": fulfilment_id.to_string(),
        "issuer": ISSUER,
        "fulfiller": FULFILER,
    }))
}

pub fn snapshot(records: Vec<EventRecord>) -> LogSnapshot {
    LogSnapshot::from_records(records)
}

pub fn bounty_ids(views: &BoardViews) -> Vec<u64> {
    views.open_bounties.iter().map(|b| b.bounty_id.0).collect()
}

pub fn fulfilment_ids(views: &BoardViews) -> Vec<(u64, u64)> {
    views
        .valid_fulfilments
        .iter()
        .map(|f| (f.bounty_id.0, f.fulfilment_id.0))
        .collect()
}

mod common;

use bountyfold::{project, BountyId, EventLogStore, EventRecord, LogSnapshot, Projection};
use common::{acceptance, cancellation, fulfilment, issuance};
use proptest::prelude::*;
use std::collections::HashSet;

fn arb_record() -> impl Strategy<Value = EventRecord> {
    prop_oneof![
        3 => (0..6u64, 1..100u128).prop_map(|(id, amount)| issuance(id, amount, "X")),
        1 => (0..6u64).prop_map(cancellation),
        3 => (0..6u64, 0..3u64).prop_map(|(id, fid)| fulfilment(id, fid, "Y")),
        1 => (0..6u64, 0..3u64).prop_map(|(id, fid)| acceptance(id, fid)),
    ]
}

fn arb_log() -> impl Strategy<Value = Vec<EventRecord>> {
    proptest::collection::vec(arb_record(), 0..40)
}

fn store_of(records: &[EventRecord]) -> EventLogStore {
    let mut store = EventLogStore::new();
    for record in records {
        store.append(record.clone());
    }
    store
}

// Projecting the same log twice, or folding it by hand, gives identical views.
proptest! {
    #[test]
    fn prop_projection_determinism(records in arb_log()) {
        let log = LogSnapshot::from_records(records.clone());
        let first = project(&log);
        let second = project(&log.clone());
        prop_assert_eq!(&first, &second);

        let folded = records
            .iter()
            .fold(Projection::default(), |state, record| state.apply(record, None))
            .finish();
        prop_assert_eq!(first, folded);
    }
}

// Once a bounty has been cancelled or accepted, no longer prefix shows it open.
proptest! {
    #[test]
    fn prop_monotonic_removal(records in arb_log()) {
        let store = store_of(&records);
        let mut closed = HashSet::new();

        for len in 0..=records.len() {
            if len > 0 && records[len - 1].kind().closes_bounty() {
                closed.insert(records[len - 1].event.bounty_id());
            }
            let views = project(&store.snapshot_prefix(len));
            for bounty in &views.open_bounties {
                prop_assert!(!closed.contains(&bounty.bounty_id));
            }
        }
    }
}

// A fulfilment of a closed bounty never appears in the valid view, and every
// valid fulfilment belongs to an open bounty.
proptest! {
    #[test]
    fn prop_orphan_suppression(records in arb_log()) {
        let store = store_of(&records);

        for len in 0..=records.len() {
            let closed: HashSet<BountyId> = records[..len]
                .iter()
                .filter(|r| r.kind().closes_bounty())
                .map(|r| r.event.bounty_id())
                .collect();
            let views = project(&store.snapshot_prefix(len));
            for claim in &views.valid_fulfilments {
                prop_assert!(!closed.contains(&claim.bounty_id));
                prop_assert!(views.is_open(claim.bounty_id));
            }
        }
    }
}

// Closing a bounty that was never issued changes neither view.
proptest! {
    #[test]
    fn prop_unmatched_removal_is_noop(
        records in arb_log(),
        strays in proptest::collection::vec((100..110u64, any::<bool>(), any::<prop::sample::Index>()), 0..5)
    ) {
        let mut with_strays = records.clone();
        for (id, cancel, at) in strays {
            let stray = if cancel { cancellation(id) } else { acceptance(id, 0) };
            let index = at.index(with_strays.len() + 1);
            with_strays.insert(index, stray);
        }

        let plain = project(&LogSnapshot::from_records(records));
        let noisy = project(&LogSnapshot::from_records(with_strays));
        prop_assert_eq!(plain.open_bounties, noisy.open_bounties);
        prop_assert_eq!(plain.valid_fulfilments, noisy.valid_fulfilments);
    }
}

// Redelivering the whole log (at-least-once replay) does not change the views.
proptest! {
    #[test]
    fn prop_replay_duplicates_are_absorbed(records in arb_log()) {
        let mut replayed = records.clone();
        replayed.extend(records.iter().cloned());

        let once = project(&LogSnapshot::from_records(records));
        let twice = project(&LogSnapshot::from_records(replayed));
        prop_assert_eq!(once.open_bounties, twice.open_bounties);
        prop_assert_eq!(once.valid_fulfilments, twice.valid_fulfilments);
    }
}

use crate::error::RecordError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const BOUNTY_ID: &[&str] = &["bounty_id", "bountyId"];
const FULFILMENT_ID: &[&str] = &[
    "fulfillment_id",
    "fulfilment_id",
    "fulfillmentId",
    "fulfilmentId",
];
const FULFILER: &[&str] = &["fulfiller", "fulfiler"];
const ISSUER: &[&str] = &["issuer"];
const AMOUNT: &[&str] = &["amount"];
const DATA: &[&str] = &["data"];

/// The four lifecycle event kinds a bounty ledger emits.
///
/// Serialized in snake_case (`"issuance"`, ...). The contract event names
/// (`"BountyIssued"`, ...) are accepted as aliases when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[serde(alias = "BountyIssued")]
    Issuance,
    #[serde(alias = "BountyCancelled")]
    Cancellation,
    #[serde(alias = "BountyFulfilled")]
    Fulfilment,
    #[serde(alias = "FulfillmentAccepted")]
    Acceptance,
}

impl EventKind {
    /// Every kind, in the order subscriptions are opened.
    pub const ALL: [EventKind; 4] = [
        EventKind::Issuance,
        EventKind::Cancellation,
        EventKind::Fulfilment,
        EventKind::Acceptance,
    ];

    /// The contract event this kind is delivered under.
    pub fn event_name(self) -> &'static str {
        match self {
            EventKind::Issuance => "BountyIssued",
            EventKind::Cancellation => "BountyCancelled",
            EventKind::Fulfilment => "BountyFulfilled",
            EventKind::Acceptance => "FulfillmentAccepted",
        }
    }

    /// Inverse of [`EventKind::event_name`].
    pub fn from_event_name(name: &str) -> Option<Self> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.event_name() == name)
    }

    /// Whether an event of this kind closes its bounty.
    pub fn closes_bounty(self) -> bool {
        matches!(self, EventKind::Cancellation | EventKind::Acceptance)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Issuance => "issuance",
            EventKind::Cancellation => "cancellation",
            EventKind::Fulfilment => "fulfilment",
            EventKind::Acceptance => "acceptance",
        };
        f.write_str(name)
    }
}

/// Ledger-assigned bounty identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BountyId(pub u64);

impl fmt::Display for BountyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ledger-assigned fulfilment identifier, unique within its bounty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FulfilmentId(pub u64);

impl fmt::Display for FulfilmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Bounty reward in the ledger's smallest unit.
///
/// Serialized as a decimal string: wei-scale values overflow JSON numbers
/// in most consumers. Deserializes from either a string or a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(pub u128);

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an unsigned integer or a decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(u128::from(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.trim()
                    .parse()
                    .map(Amount)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// Opaque reference into content-addressed storage.
///
/// The ledger stores whatever string the issuer supplied; only references
/// shaped like a CIDv0 hash are worth resolving.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        ContentRef(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for a 46-character base58 string starting with `Qm`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bountyfold::ContentRef;
    ///
    /// let cid = ContentRef::new("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG");
    /// assert!(cid.is_addressable());
    /// assert!(!ContentRef::new("fix the login page").is_addressable());
    /// ```
    pub fn is_addressable(&self) -> bool {
        self.0.len() == 46
            && self.0.starts_with("Qm")
            && self.0.chars().all(|c| BASE58_ALPHABET.contains(c))
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentRef {
    fn from(reference: &str) -> Self {
        ContentRef::new(reference)
    }
}

impl From<String> for ContentRef {
    fn from(reference: String) -> Self {
        ContentRef(reference)
    }
}

/// A normalized bounty lifecycle event.
///
/// Serialized with an internal `"kind"` tag so journal lines read as
/// `{"kind":"issuance","bounty_id":1,...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BountyEvent {
    Issuance {
        bounty_id: BountyId,
        issuer: String,
        amount: Amount,
        content: ContentRef,
    },
    Cancellation {
        bounty_id: BountyId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issuer: Option<String>,
    },
    Fulfilment {
        bounty_id: BountyId,
        fulfilment_id: FulfilmentId,
        fulfiler: String,
        content: ContentRef,
    },
    Acceptance {
        bounty_id: BountyId,
        fulfilment_id: FulfilmentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        issuer: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fulfiler: Option<String>,
    },
}

impl BountyEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BountyEvent::Issuance { .. } => EventKind::Issuance,
            BountyEvent::Cancellation { .. } => EventKind::Cancellation,
            BountyEvent::Fulfilment { .. } => EventKind::Fulfilment,
            BountyEvent::Acceptance { .. } => EventKind::Acceptance,
        }
    }

    pub fn bounty_id(&self) -> BountyId {
        match self {
            BountyEvent::Issuance { bounty_id, .. }
            | BountyEvent::Cancellation { bounty_id, .. }
            | BountyEvent::Fulfilment { bounty_id, .. }
            | BountyEvent::Acceptance { bounty_id, .. } => *bounty_id,
        }
    }

    pub fn fulfilment_id(&self) -> Option<FulfilmentId> {
        match self {
            BountyEvent::Fulfilment { fulfilment_id, .. }
            | BountyEvent::Acceptance { fulfilment_id, .. } => Some(*fulfilment_id),
            _ => None,
        }
    }

    /// The content reference carried by issuance and fulfilment events.
    pub fn content(&self) -> Option<&ContentRef> {
        match self {
            BountyEvent::Issuance { content, .. } | BountyEvent::Fulfilment { content, .. } => {
                Some(content)
            }
            _ => None,
        }
    }
}

/// An event as delivered by a ledger subscription, before normalization.
///
/// Mirrors the shape of a contract log entry: the decoded event arguments
/// under `returnValues` plus where the event was mined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default)]
    pub return_values: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

impl RawEvent {
    pub fn new(return_values: Value) -> Self {
        RawEvent {
            return_values,
            block_number: None,
            transaction_hash: None,
        }
    }

    pub fn with_block(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }

    pub fn with_transaction(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }
}

/// One entry of the event log: a normalized event plus its provenance.
///
/// Records are immutable once appended. The log keeps them in arrival
/// order, which is the only ordering they carry.
///
/// # Examples
///
/// ```
/// use bountyfold::{BountyId, EventKind, EventRecord, RawEvent};
/// use serde_json::json;
///
/// let raw = RawEvent::new(json!({
///     "bounty_id": "7",
///     "issuer": "0xabc",
///     "amount": "5000",
///     "data": "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG",
/// }))
/// .with_block(12);
///
/// let record = EventRecord::from_raw(EventKind::Issuance, &raw).unwrap();
/// assert_eq!(record.kind(), EventKind::Issuance);
/// assert_eq!(record.event.bounty_id(), BountyId(7));
/// assert_eq!(record.block_number, Some(12));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EventRecord {
    pub event: BountyEvent,

    /// Block the event was mined in, when the ledger reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

impl EventRecord {
    pub fn new(event: BountyEvent) -> Self {
        EventRecord {
            event,
            block_number: None,
            transaction_hash: None,
        }
    }

    pub fn with_block(mut self, block_number: u64) -> Self {
        self.block_number = Some(block_number);
        self
    }

    pub fn with_transaction(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }

    /// Normalize a raw ledger payload delivered under `kind`.
    ///
    /// Identifiers and amounts may arrive as JSON numbers or decimal
    /// strings. Both the contract's snake_case argument names and their
    /// camelCase spellings are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when a field the kind requires is missing or
    /// cannot be parsed.
    pub fn from_raw(kind: EventKind, raw: &RawEvent) -> Result<Self, RecordError> {
        let values = &raw.return_values;
        let event = match kind {
            EventKind::Issuance => BountyEvent::Issuance {
                bounty_id: BountyId(id(values, kind, BOUNTY_ID)?),
                issuer: text(values, kind, ISSUER)?,
                amount: Amount(uint(values, kind, AMOUNT)?),
                content: ContentRef::new(text(values, kind, DATA)?),
            },
            EventKind::Cancellation => BountyEvent::Cancellation {
                bounty_id: BountyId(id(values, kind, BOUNTY_ID)?),
                issuer: optional_text(values, ISSUER),
            },
            EventKind::Fulfilment => BountyEvent::Fulfilment {
                bounty_id: BountyId(id(values, kind, BOUNTY_ID)?),
                fulfilment_id: FulfilmentId(id(values, kind, FULFILMENT_ID)?),
                fulfiler: text(values, kind, FULFILER)?,
                content: ContentRef::new(text(values, kind, DATA)?),
            },
            EventKind::Acceptance => BountyEvent::Acceptance {
                bounty_id: BountyId(id(values, kind, BOUNTY_ID)?),
                fulfilment_id: FulfilmentId(id(values, kind, FULFILMENT_ID)?),
                issuer: optional_text(values, ISSUER),
                fulfiler: optional_text(values, FULFILER),
            },
        };

        Ok(EventRecord {
            event,
            block_number: raw.block_number,
            transaction_hash: raw.transaction_hash.clone(),
        })
    }
}

fn lookup<'a>(values: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| values.get(*name).filter(|v| !v.is_null()))
}

fn uint(values: &Value, kind: EventKind, names: &[&'static str]) -> Result<u128, RecordError> {
    let field = names[0];
    let value = lookup(values, names).ok_or(RecordError::MissingField { kind, field })?;
    let parsed = match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .or_else(|| n.as_f64().and_then(whole_number)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| RecordError::InvalidField {
        kind,
        field,
        value: value.to_string(),
    })
}

// Integers past u64::MAX come out of the JSON decoder as f64.
fn whole_number(v: f64) -> Option<u128> {
    const LIMIT: f64 = 340_282_366_920_938_463_463_374_607_431_768_211_456.0;
    (v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v < LIMIT).then(|| v as u128)
}

fn id(values: &Value, kind: EventKind, names: &[&'static str]) -> Result<u64, RecordError> {
    let field = names[0];
    let raw = uint(values, kind, names)?;
    u64::try_from(raw).map_err(|_| RecordError::InvalidField {
        kind,
        field,
        value: raw.to_string(),
    })
}

fn text(values: &Value, kind: EventKind, names: &[&'static str]) -> Result<String, RecordError> {
    let field = names[0];
    match lookup(values, names) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(RecordError::InvalidField {
            kind,
            field,
            value: other.to_string(),
        }),
        None => Err(RecordError::MissingField { kind, field }),
    }
}

fn optional_text(values: &Value, names: &[&str]) -> Option<String> {
    lookup(values, names)
        .and_then(Value::as_str)
        .map(str::to_string)
}

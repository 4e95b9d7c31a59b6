//! Append-only event sink with a SHA-256 hash chain.
//!
//! Every emitted [`Event`] becomes a [`JournalEntry`] whose hash commits to
//! the previous entry's hash, its sequence number, its timestamp, and the
//! event's fields. Rewriting or dropping any past entry breaks
//! [`EventJournal::verify_chain`].

use chrono::{DateTime, Utc};
use safepay_types::{Event, PaymentId, Result, SafepayError};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Where the engine sends its events.
pub trait EventSink {
    fn emit(&mut self, event: Event);
}

/// Plain buffer, handy when ordering is all a caller cares about.
impl EventSink for Vec<Event> {
    fn emit(&mut self, event: Event) {
        self.push(event);
    }
}

/// One journaled event.
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    /// Position in the journal, starting at 0.
    pub sequence: u64,
    pub event: Event,
    pub emitted_at: DateTime<Utc>,
    /// Hash of the previous entry (all zeros for the first).
    pub prev_hash: [u8; 32],
    pub hash: [u8; 32],
}

impl JournalEntry {
    #[must_use]
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

/// Hash-chained, in-memory event log.
pub struct EventJournal {
    entries: Vec<JournalEntry>,
}

impl EventJournal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Events in emission order.
    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.entries.iter().map(|e| &e.event)
    }

    /// Events emitted at or after `sequence`.
    pub fn since(&self, sequence: u64) -> impl Iterator<Item = &Event> {
        self.entries
            .iter()
            .filter(move |e| e.sequence >= sequence)
            .map(|e| &e.event)
    }

    /// Events that name the given payment.
    pub fn for_payment(&self, id: PaymentId) -> impl Iterator<Item = &Event> {
        self.events().filter(move |e| e.payment_id() == Some(id))
    }

    /// Hash of the newest entry, or all zeros when empty.
    #[must_use]
    pub fn head(&self) -> [u8; 32] {
        self.entries.last().map_or([0u8; 32], |e| e.hash)
    }

    /// Recompute every hash and link.
    ///
    /// # Errors
    /// Returns [`SafepayError::Internal`] naming the first broken entry.
    pub fn verify_chain(&self) -> Result<()> {
        let mut prev = [0u8; 32];
        for (i, entry) in self.entries.iter().enumerate() {
            let expected = entry_hash(&prev, entry.sequence, entry.emitted_at, &entry.event);
            if entry.sequence != i as u64 || entry.prev_hash != prev || entry.hash != expected {
                return Err(SafepayError::Internal(format!(
                    "journal chain broken at sequence {}",
                    entry.sequence
                )));
            }
            prev = entry.hash;
        }
        Ok(())
    }

    /// Export as newline-delimited JSON for indexers.
    pub fn to_json_lines(&self) -> Result<String> {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl Default for EventJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventJournal {
    fn emit(&mut self, event: Event) {
        let sequence = self.entries.len() as u64;
        let prev_hash = self.head();
        let emitted_at = Utc::now();
        let hash = entry_hash(&prev_hash, sequence, emitted_at, &event);
        tracing::trace!(sequence, event = event.name(), "journal append");
        self.entries.push(JournalEntry {
            sequence,
            event,
            emitted_at,
            prev_hash,
            hash,
        });
    }
}

/// Hash committing to the chain link, position, time, and event fields.
fn entry_hash(prev: &[u8; 32], sequence: u64, at: DateTime<Utc>, event: &Event) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"safepay:journal:v1:");
    hasher.update(prev);
    hasher.update(sequence.to_le_bytes());
    hasher.update(at.timestamp_micros().to_le_bytes());
    hasher.update(event.name().as_bytes());

    match event {
        Event::PaymentCreated {
            id,
            issuer,
            receiver,
            validators,
        } => {
            hasher.update(id.0.to_le_bytes());
            hasher.update(issuer.0.as_bytes());
            hasher.update(receiver.0.as_bytes());
            hasher.update((validators.len() as u64).to_le_bytes());
            for v in validators {
                hasher.update(v.0.as_bytes());
            }
        }
        Event::EventApproved {
            id,
            validator,
            rate,
        }
        | Event::EventRejected {
            id,
            validator,
            rate,
        } => {
            hasher.update(id.0.to_le_bytes());
            hasher.update(validator.0.as_bytes());
            hasher.update(rate.to_le_bytes());
        }
        Event::ValueTransferred { to, amount } => {
            hasher.update(to.0.as_bytes());
            hasher.update(amount.normalize().to_string().as_bytes());
        }
    }

    hasher.finalize().into()
}

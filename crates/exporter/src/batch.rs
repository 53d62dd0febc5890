//! Accumulates export records and groups them into wire payloads.

use crate::error::ExportError;
use crate::record::ExportRecord;
use optron_config::ValidatedOptronConfig;
use serde::Serialize;
use std::num::NonZeroUsize;

/// Line terminator written after every payload.
pub const PAYLOAD_TERMINATOR: &[u8] = b"\r\n";

/// How a cycle's records are grouped for the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    /// Merge every record into one object; later fields overwrite earlier ones.
    Combined,
    /// Send JSON arrays of at most `batch_size` records.
    Bulk {
        /// Records per array.
        batch_size: NonZeroUsize,
    },
}

impl BatchPolicy {
    /// Policy implied by the collector's bulk support.
    #[must_use]
    pub fn from_config(config: &ValidatedOptronConfig) -> Self {
        config
            .bulk_batch_size()
            .and_then(|size| usize::try_from(size).ok())
            .and_then(NonZeroUsize::new)
            .map_or(Self::Combined, |batch_size| Self::Bulk { batch_size })
    }
}

/// One write to the collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// A single merged object.
    Object(ExportRecord),
    /// An array of records.
    Batch(Vec<ExportRecord>),
}

impl Payload {
    /// Serialize as one JSON document followed by `\r\n`.
    pub fn encode(&self) -> Result<Vec<u8>, ExportError> {
        let mut bytes = serde_json::to_vec(self)?;
        bytes.extend_from_slice(PAYLOAD_TERMINATOR);
        Ok(bytes)
    }

    /// Records carried: 1 for a merged object.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Object(_) => 1,
            Self::Batch(records) => records.len(),
        }
    }

    /// True for an empty batch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buffer of pending records for one export cycle.
#[derive(Debug)]
pub struct BatchBuilder {
    policy: BatchPolicy,
    combined: ExportRecord,
    pending: Vec<ExportRecord>,
    appended: usize,
}

impl BatchBuilder {
    /// Empty builder using `policy`.
    #[must_use]
    pub fn new(policy: BatchPolicy) -> Self {
        Self {
            policy,
            combined: ExportRecord::new(),
            pending: Vec::new(),
            appended: 0,
        }
    }

    /// Grouping policy.
    #[must_use]
    pub const fn policy(&self) -> BatchPolicy {
        self.policy
    }

    /// Records appended since the last flush.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.appended
    }

    /// Buffer one record.
    pub fn append(&mut self, record: ExportRecord) {
        self.appended += 1;
        match self.policy {
            BatchPolicy::Combined => self.combined.merge(record),
            BatchPolicy::Bulk { .. } => self.pending.push(record),
        }
    }

    /// Drain the buffer into payloads. The buffer is always left empty.
    ///
    /// Nothing is produced when no record was appended.
    pub fn flush(&mut self) -> Vec<Payload> {
        let appended = std::mem::take(&mut self.appended);
        let combined = std::mem::take(&mut self.combined);
        let pending = std::mem::take(&mut self.pending);
        if appended == 0 {
            return Vec::new();
        }

        match self.policy {
            BatchPolicy::Combined => vec![Payload::Object(combined)],
            BatchPolicy::Bulk { batch_size } => {
                let mut records = pending.into_iter().peekable();
                let mut payloads = Vec::new();
                while records.peek().is_some() {
                    payloads.push(Payload::Batch(
                        records.by_ref().take(batch_size.get()).collect(),
                    ));
                }
                payloads
            },
        }
    }
}

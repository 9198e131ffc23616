//
// Link-State Database: a balanced search tree keyed by
// 8-byte LSP id, holding one entry per `(level, id)`. `BTreeMap` gives us
// that balanced-tree/lexicographic-key behavior directly.
//
// An LSP is owned by the LSDB; flood-tree and PSNP-tree entries elsewhere
// hold only the id plus a refcount bump here, so an expired LSP survives
// until every adjacency has stopped referencing it.
//

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bbl_packet::isis::LspId;
use serde::{Deserialize, Serialize};

use crate::debug::Debug;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum LspSource {
    SelfOriginated,
    Adjacency,
    External,
}

pub struct LspEntry {
    pub lsp_id: LspId,
    pub sequence: u32,
    pub remaining_lifetime: u16,
    pub last_generated: Instant,
    pub source: LspSource,
    pub refcount: u32,
    pub expired: bool,
    /// Raw encoded PDU, kept for flooding without re-encoding and for
    /// control-socket replay.
    pub raw: Vec<u8>,
}

impl LspEntry {
    pub fn is_newer_or_equal(&self, sequence: u32) -> bool {
        sequence <= self.sequence
    }
}

#[derive(Default)]
pub struct Lsdb {
    entries: BTreeMap<LspId, LspEntry>,
}

/// Outcome of offering a received or locally built LSP to the LSDB, used by
/// the instance layer to decide whether to flood and to whom.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReceiveOutcome {
    /// Newly learned id; install and flood to every adjacency but the
    /// receiving one.
    Installed,
    /// Stored sequence already covers the received one; only a PSNP ack is
    /// owed, no flood.
    AlreadyCurrent,
    /// Our own LSP came back with a higher sequence than we hold; we bumped
    /// our copy above it and must regenerate and reflood.
    SelfBumped(u32),
    /// An externally loaded LSP can never be overwritten by a peer.
    ExternalProtected,
    /// Sequence advanced; replace and flood.
    Replaced,
}

impl Lsdb {
    pub fn get(&self, id: &LspId) -> Option<&LspEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &LspId) -> Option<&mut LspEntry> {
        self.entries.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LspId, &LspEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a freshly built self-originated LSP, replacing any prior
    /// version unconditionally (the instance is the sole writer of its own
    /// id).
    pub fn install_self(
        &mut self,
        lsp_id: LspId,
        sequence: u32,
        remaining_lifetime: u16,
        raw: Vec<u8>,
        now: Instant,
    ) {
        Debug::LspInstall(lsp_id, sequence, LspSource::SelfOriginated).log();
        self.entries.insert(
            lsp_id,
            LspEntry {
                lsp_id,
                sequence,
                remaining_lifetime,
                last_generated: now,
                source: LspSource::SelfOriginated,
                refcount: 0,
                expired: false,
                raw,
            },
        );
    }

    pub fn install_external(&mut self, lsp_id: LspId, sequence: u32, raw: Vec<u8>, now: Instant) {
        Debug::LspInstall(lsp_id, sequence, LspSource::External).log();
        self.entries.insert(
            lsp_id,
            LspEntry {
                lsp_id,
                sequence,
                remaining_lifetime: u16::MAX,
                last_generated: now,
                source: LspSource::External,
                refcount: 0,
                expired: false,
                raw,
            },
        );
    }

    /// Implements "Receipt of LSP": validates only sequence
    /// comparison and source rules here; authentication is checked by the
    /// caller before this is reached.
    pub fn receive(
        &mut self,
        lsp_id: LspId,
        sequence: u32,
        remaining_lifetime: u16,
        raw: Vec<u8>,
        now: Instant,
    ) -> ReceiveOutcome {
        let Some(entry) = self.entries.get_mut(&lsp_id) else {
            Debug::LspInstall(lsp_id, sequence, LspSource::Adjacency).log();
            self.entries.insert(
                lsp_id,
                LspEntry {
                    lsp_id,
                    sequence,
                    remaining_lifetime,
                    last_generated: now,
                    source: LspSource::Adjacency,
                    refcount: 0,
                    expired: false,
                    raw,
                },
            );
            return ReceiveOutcome::Installed;
        };
        match entry.source {
            LspSource::External => ReceiveOutcome::ExternalProtected,
            LspSource::SelfOriginated if sequence > entry.sequence => {
                let bumped = sequence + 1;
                entry.sequence = bumped;
                entry.last_generated = now;
                entry.expired = false;
                Debug::LspSelfBumped(lsp_id, bumped).log();
                ReceiveOutcome::SelfBumped(bumped)
            }
            LspSource::SelfOriginated => ReceiveOutcome::AlreadyCurrent,
            LspSource::Adjacency => {
                if sequence <= entry.sequence {
                    ReceiveOutcome::AlreadyCurrent
                } else {
                    entry.sequence = sequence;
                    entry.remaining_lifetime = remaining_lifetime;
                    entry.last_generated = now;
                    entry.expired = false;
                    entry.raw = raw;
                    Debug::LspInstall(lsp_id, sequence, LspSource::Adjacency).log();
                    ReceiveOutcome::Replaced
                }
            }
        }
    }

    pub fn mark_expired(&mut self, lsp_id: &LspId) {
        if let Some(entry) = self.entries.get_mut(lsp_id) {
            entry.expired = true;
            Debug::LspPurge(*lsp_id).log();
        }
    }

    pub fn incref(&mut self, lsp_id: &LspId) {
        if let Some(entry) = self.entries.get_mut(lsp_id) {
            entry.refcount += 1;
        }
    }

    pub fn decref(&mut self, lsp_id: &LspId) {
        if let Some(entry) = self.entries.get_mut(lsp_id) {
            entry.refcount = entry.refcount.saturating_sub(1);
        }
    }

    /// Frees every entry whose lifetime expired and which no flood/PSNP
    /// tree references anymore.
    pub fn gc(&mut self) {
        self.entries
            .retain(|_, entry| !(entry.expired && entry.refcount == 0));
    }

    /// Age every entry's remaining lifetime by `elapsed`, marking expired
    /// ones so the next `gc` pass can free them once dereferenced.
    pub fn tick_lifetimes(&mut self, elapsed: Duration) {
        let secs = elapsed.as_secs().min(u16::MAX as u64) as u16;
        for entry in self.entries.values_mut() {
            if entry.source == LspSource::External {
                continue;
            }
            entry.remaining_lifetime = entry.remaining_lifetime.saturating_sub(secs);
            if entry.remaining_lifetime == 0 {
                entry.expired = true;
            }
        }
    }
}

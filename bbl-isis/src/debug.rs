//
// IS-IS debug logging, following this workspace's per-crate `Debug<'a>`
// enum pattern: one variant per loggable event, a `.log()` method that
// picks the right `tracing` level instead of scattering bare `debug!()`
// calls across the state machines.
//

use tracing::{debug, trace};

use crate::adjacency::{AdjacencyEvent, AdjacencyState};
use crate::lsdb::LspSource;
use bbl_packet::isis::LspId;

#[derive(Debug)]
pub enum Debug<'a> {
    AdjacencyStateChange(&'a [u8; 6], AdjacencyState, AdjacencyState, AdjacencyEvent),
    HelloRx(&'a [u8; 6]),
    HelloTx(&'a [u8; 6]),
    LspInstall(LspId, u32, LspSource),
    LspDiscard(LspId, &'static str),
    LspPurge(LspId),
    LspRefresh(LspId, u32),
    LspSelfBumped(LspId, u32),
    Flood(LspId, &'a [u8; 6]),
    CsnpScan(u64),
}

impl Debug<'_> {
    pub fn log(&self) {
        match self {
            Debug::AdjacencyStateChange(sys_id, old, new, event) => {
                debug!(system_id = ?sys_id, ?old, ?new, ?event, "isis adjacency state change");
            }
            Debug::HelloRx(sys_id) => trace!(system_id = ?sys_id, "isis hello rx"),
            Debug::HelloTx(sys_id) => trace!(system_id = ?sys_id, "isis hello tx"),
            Debug::LspInstall(id, seq, source) => {
                debug!(?id, seq, ?source, "isis lsp installed")
            }
            Debug::LspDiscard(id, why) => debug!(?id, why, "isis lsp discarded"),
            Debug::LspPurge(id) => debug!(?id, "isis lsp purged"),
            Debug::LspRefresh(id, seq) => trace!(?id, seq, "isis lsp refreshed"),
            Debug::LspSelfBumped(id, seq) => {
                debug!(?id, seq, "isis self lsp sequence bumped past stale copy")
            }
            Debug::Flood(id, peer) => trace!(?id, peer = ?peer, "isis flooding lsp"),
            Debug::CsnpScan(scan_id) => trace!(scan_id, "isis csnp scan completed"),
        }
    }
}

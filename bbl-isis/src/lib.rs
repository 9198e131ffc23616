//! IS-IS link-state control plane: adjacency bring-up,
//! self-LSP generation, flooding and CSNP/PSNP reconciliation. Deliberately
//! has no routing RIB/FIB or SPF computation - this emulator only needs a
//! faithful control plane peer, not a forwarding router.

pub mod adjacency;
pub mod debug;
pub mod error;
pub mod instance;
pub mod lsdb;
pub mod mrt;

pub use adjacency::{Adjacency, AdjacencyEvent, AdjacencyState, Level};
pub use error::Error;
pub use instance::{ExternalConnection, Instance, IsisInterface};
pub use lsdb::{Lsdb, LspEntry, LspSource, ReceiveOutcome};
pub use mrt::{parse_dump, MrtLsp};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn test_instance(system_id: [u8; 6]) -> Instance {
        Instance::new(&bbl_utils::config::IsisConfig {
            system_id,
            area_addresses: vec![vec![0x49, 0x00, 0x01]],
            hostname: Some("test-router".into()),
            router_id: None,
            level_type: bbl_utils::config::IsisLevelType::L1L2,
            hello_interval: std::time::Duration::from_secs(9),
            holding_multiplier: 3,
            lsp_lifetime: std::time::Duration::from_secs(1200),
            lsp_refresh_interval: std::time::Duration::from_secs(600),
            lsp_retry_interval: std::time::Duration::from_secs(5),
            csnp_interval: std::time::Duration::from_secs(10),
            psnp_interval: std::time::Duration::from_secs(2),
            sr_enabled: false,
            srgb_base: 0,
            srgb_range: 0,
        })
    }

    #[test]
    fn adjacency_up_seeds_flood_tree_with_existing_lsdb() {
        let mut inst = test_instance([1, 0, 0, 0, 0, 1]);
        let now = Instant::now();
        inst.generate_self_lsp(Level::L1, now);
        inst.adjacency_up(1, Level::L1, [2, 0, 0, 0, 0, 2], 10);
        let adj = inst.adjacency_mut(1, Level::L1).unwrap();
        assert!(adj.flood_tree.contains(&inst.self_lsp_id()));
    }

    #[test]
    fn receive_unknown_lsp_installs_and_floods() {
        let mut inst = test_instance([1, 0, 0, 0, 0, 1]);
        let now = Instant::now();
        inst.adjacency_up(1, Level::L1, [2, 0, 0, 0, 0, 2], 10);
        inst.adjacency_up(2, Level::L1, [3, 0, 0, 0, 0, 3], 10);
        let peer_lsp_id = bbl_packet::isis::LspId {
            system_id: [2, 0, 0, 0, 0, 2],
            pseudonode: 0,
            fragment: 0,
        };
        let pdu = bbl_packet::isis::LspPdu {
            lsp_id: peer_lsp_id,
            sequence: 1,
            remaining_lifetime: 1200,
            checksum: 0,
            overload: false,
            level: 1,
            tlvs: vec![],
        };
        let outcome = inst
            .receive_lsp(Level::L1, &pdu, vec![], 1, now)
            .expect("receive ok");
        assert_eq!(outcome, ReceiveOutcome::Installed);
        // Flooded to adjacency 2, not back to the receiving adjacency 1.
        assert!(inst
            .adjacency_mut(2, Level::L1)
            .unwrap()
            .flood_tree
            .contains(&peer_lsp_id));
        assert!(!inst
            .adjacency_mut(1, Level::L1)
            .unwrap()
            .flood_tree
            .contains(&peer_lsp_id));
    }

    #[test]
    fn stale_self_copy_from_peer_triggers_bump_and_reflood() {
        let mut inst = test_instance([1, 0, 0, 0, 0, 1]);
        let now = Instant::now();
        inst.generate_self_lsp(Level::L1, now);
        let self_id = inst.self_lsp_id();
        let higher_seq = inst.lsdb_l1.get(&self_id).unwrap().sequence + 5;
        let pdu = bbl_packet::isis::LspPdu {
            lsp_id: self_id,
            sequence: higher_seq,
            remaining_lifetime: 1200,
            checksum: 0,
            overload: false,
            level: 1,
            tlvs: vec![],
        };
        let outcome = inst
            .receive_lsp(Level::L1, &pdu, vec![], 1, now)
            .expect("receive ok");
        assert_eq!(outcome, ReceiveOutcome::SelfBumped(higher_seq + 1));
        assert_eq!(
            inst.lsdb_l1.get(&self_id).unwrap().sequence,
            higher_seq + 1
        );
    }

    #[test]
    fn external_lsp_is_never_overwritten_by_peer() {
        let mut inst = test_instance([1, 0, 0, 0, 0, 1]);
        let now = Instant::now();
        let ext_id = bbl_packet::isis::LspId {
            system_id: [9, 0, 0, 0, 0, 9],
            pseudonode: 0,
            fragment: 0,
        };
        let ext_pdu = bbl_packet::isis::LspPdu {
            lsp_id: ext_id,
            sequence: 1,
            remaining_lifetime: 1200,
            checksum: 0,
            overload: false,
            level: 1,
            tlvs: vec![],
        };
        let mut raw = Vec::new();
        ext_pdu.encode(&mut raw);
        inst.load_external(Level::L1, &ext_pdu, raw, now);

        let higher_pdu = bbl_packet::isis::LspPdu {
            sequence: 99,
            ..ext_pdu
        };
        let outcome = inst
            .receive_lsp(Level::L1, &higher_pdu, vec![], 1, now)
            .expect("receive ok");
        assert_eq!(outcome, ReceiveOutcome::ExternalProtected);
        assert_eq!(inst.lsdb_l1.get(&ext_id).unwrap().sequence, 1);
    }

    #[test]
    fn csnp_with_missing_local_entry_requests_flood() {
        let mut inst = test_instance([1, 0, 0, 0, 0, 1]);
        inst.adjacency_up(1, Level::L1, [2, 0, 0, 0, 0, 2], 10);
        // Drain the seed flood so we can tell the CSNP handling re-adds it.
        inst.adjacency_mut(1, Level::L1).unwrap().flood_tree.clear();

        let missing_id = bbl_packet::isis::LspId {
            system_id: [7, 0, 0, 0, 0, 7],
            pseudonode: 0,
            fragment: 0,
        };
        let csnp = bbl_packet::isis::CsnpPdu {
            source_id: [2, 0, 0, 0, 0, 2],
            start_lsp_id: missing_id,
            end_lsp_id: missing_id,
            entries: vec![(missing_id, 5, 1200, 0)],
        };
        inst.handle_csnp(Level::L1, &csnp, 1);
        assert!(inst
            .adjacency_mut(1, Level::L1)
            .unwrap()
            .flood_tree
            .contains(&missing_id));
    }

    #[test]
    fn gc_frees_expired_entry_once_refcount_drops() {
        let mut lsdb = Lsdb::default();
        let now = Instant::now();
        let id = bbl_packet::isis::LspId {
            system_id: [4, 0, 0, 0, 0, 4],
            pseudonode: 0,
            fragment: 0,
        };
        lsdb.install_external(id, 1, vec![], now);
        lsdb.incref(&id);
        lsdb.mark_expired(&id);
        lsdb.gc();
        assert!(lsdb.get(&id).is_some(), "still referenced, must survive gc");
        lsdb.decref(&id);
        lsdb.gc();
        assert!(lsdb.get(&id).is_none(), "unreferenced and expired, must be freed");
    }
}

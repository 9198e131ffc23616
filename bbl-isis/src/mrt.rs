//
// External-LSP loader for MRT-style dumps: loading external LSPs from an
// MRT TABLE_DUMP is an offline preprocessing step feeding the same
// control-socket path a raw LSP update would. We only need the subset of
// the MRT framing that recovers a sequence of raw LSP PDU bytes - not a
// general-purpose MRT reader.
//
// Record framing: `u32` big-endian length prefix, followed by that many
// bytes of a single IS-IS LSP PDU body (the same bytes `LspPdu::decode`
// consumes). A dump is simply a concatenation of such records; there is no
// MRT header/type/subtype framing here, since nothing else in this crate
// reads the other MRT record types.
//

use bytes::{Buf, Bytes};

use crate::error::Error;
use bbl_packet::isis::LspPdu;

/// One recovered record: the decoded PDU plus the raw bytes the LSDB stores
/// verbatim (`Instance::load_external` wants both).
pub struct MrtLsp {
    pub pdu: LspPdu,
    pub raw: Vec<u8>,
}

/// Parses a dump into its LSP records. A record that fails to decode is
/// skipped rather than aborting the whole dump - one corrupt entry in an
/// offline file shouldn't block loading the rest.
pub fn parse_dump(data: &[u8]) -> Result<Vec<MrtLsp>, Error> {
    let mut buf = Bytes::copy_from_slice(data);
    let mut out = Vec::new();
    while buf.remaining() >= 4 {
        let len = buf.get_u32() as usize;
        if buf.remaining() < len {
            return Err(Error::MalformedMrt);
        }
        let raw = buf.copy_to_bytes(len);
        let mut cursor = raw.clone();
        if let Ok(pdu) = LspPdu::decode(&mut cursor) {
            out.push(MrtLsp {
                pdu,
                raw: raw.to_vec(),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbl_packet::isis::LspId;
    use bytes::BufMut;

    #[test]
    fn round_trips_a_single_record() {
        let pdu = LspPdu {
            lsp_id: LspId {
                system_id: [1, 0, 0, 0, 0, 1],
                pseudonode: 0,
                fragment: 0,
            },
            sequence: 7,
            remaining_lifetime: 1200,
            checksum: 0,
            overload: false,
            level: 1,
            tlvs: vec![],
        };
        let mut body = Vec::new();
        pdu.encode(&mut body);
        let mut dump = Vec::new();
        dump.put_u32(body.len() as u32);
        dump.extend_from_slice(&body);

        let records = parse_dump(&dump).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pdu.sequence, 7);
    }

    #[test]
    fn truncated_length_prefix_is_an_error() {
        let mut dump = Vec::new();
        dump.put_u32(100);
        assert!(matches!(parse_dump(&dump), Err(Error::MalformedMrt)));
    }
}

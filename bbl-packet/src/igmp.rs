//
// IGMPv1/v2/v3, enough of the wire format to drive the
// multicast group state machine: membership reports and leaves,
// and the v3 group-record list used for join verification.
//

use std::net::Ipv4Addr;

use bbl_utils::cursor::BufExt;
use bytes::{Buf, BufMut, BytesMut};
use internet_checksum::checksum;

use crate::error::{need, DecodeError};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IgmpVersion {
    V1,
    V2,
    V3,
}

#[derive(Clone, Debug)]
pub enum IgmpMessage {
    V1Report {
        group: Ipv4Addr,
    },
    V2Report {
        group: Ipv4Addr,
    },
    V2Leave {
        group: Ipv4Addr,
    },
    V3Report {
        records: Vec<GroupRecord>,
    },
    Query {
        max_resp_time: u8,
        group: Ipv4Addr,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RecordType {
    ModeIsInclude,
    ModeIsExclude,
    ChangeToInclude,
    ChangeToExclude,
    AllowNewSources,
    BlockOldSources,
}

#[derive(Clone, Debug)]
pub struct GroupRecord {
    pub record_type: RecordType,
    pub group: Ipv4Addr,
    pub sources: Vec<Ipv4Addr>,
}

const TYPE_V1_V2_QUERY: u8 = 0x11;
const TYPE_V1_REPORT: u8 = 0x12;
const TYPE_V2_REPORT: u8 = 0x16;
const TYPE_V2_LEAVE: u8 = 0x17;
const TYPE_V3_REPORT: u8 = 0x22;

impl RecordType {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            1 => RecordType::ModeIsInclude,
            2 => RecordType::ModeIsExclude,
            3 => RecordType::ChangeToInclude,
            4 => RecordType::ChangeToExclude,
            5 => RecordType::AllowNewSources,
            6 => RecordType::BlockOldSources,
            _ => return None,
        })
    }

    fn as_u8(self) -> u8 {
        match self {
            RecordType::ModeIsInclude => 1,
            RecordType::ModeIsExclude => 2,
            RecordType::ChangeToInclude => 3,
            RecordType::ChangeToExclude => 4,
            RecordType::AllowNewSources => 5,
            RecordType::BlockOldSources => 6,
        }
    }
}

impl IgmpMessage {
    pub fn decode(buf: &mut impl Buf) -> Result<IgmpMessage, DecodeError> {
        need(buf.remaining(), 8)?;
        let msg_type = buf.get_u8();
        let field2 = buf.get_u8();
        let _checksum = buf.get_u16();
        Ok(match msg_type {
            TYPE_V1_V2_QUERY => {
                let group = buf.try_get_ipv4().ok_or(DecodeError::Malformed("igmp group"))?;
                IgmpMessage::Query {
                    max_resp_time: field2,
                    group,
                }
            }
            TYPE_V1_REPORT => IgmpMessage::V1Report {
                group: buf.try_get_ipv4().ok_or(DecodeError::Malformed("igmp group"))?,
            },
            TYPE_V2_REPORT => IgmpMessage::V2Report {
                group: buf.try_get_ipv4().ok_or(DecodeError::Malformed("igmp group"))?,
            },
            TYPE_V2_LEAVE => IgmpMessage::V2Leave {
                group: buf.try_get_ipv4().ok_or(DecodeError::Malformed("igmp group"))?,
            },
            TYPE_V3_REPORT => {
                need(buf.remaining(), 2)?;
                buf.get_u16(); // reserved
                need(buf.remaining(), 2)?;
                let num_records = buf.get_u16();
                let mut records = Vec::new();
                for _ in 0..num_records {
                    need(buf.remaining(), 8)?;
                    let rtype = RecordType::from_u8(buf.get_u8())
                        .ok_or(DecodeError::Malformed("igmpv3 record type"))?;
                    let aux_len = buf.get_u8() as usize;
                    let num_sources = buf.get_u16() as usize;
                    let group =
                        buf.try_get_ipv4().ok_or(DecodeError::Malformed("igmpv3 group"))?;
                    let mut sources = Vec::with_capacity(num_sources);
                    for _ in 0..num_sources {
                        sources.push(
                            buf.try_get_ipv4()
                                .ok_or(DecodeError::Malformed("igmpv3 source"))?,
                        );
                    }
                    need(buf.remaining(), aux_len * 4)?;
                    buf.advance(aux_len * 4);
                    records.push(GroupRecord {
                        record_type: rtype,
                        group,
                        sources,
                    });
                }
                IgmpMessage::V3Report { records }
            }
            other => return Err(DecodeError::UnknownProtocol(other as u16)),
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut body = BytesMut::new();
        match self {
            IgmpMessage::Query { max_resp_time, group } => {
                body.put_u8(TYPE_V1_V2_QUERY);
                body.put_u8(*max_resp_time);
                body.put_u16(0);
                body.put_ipv4(*group);
            }
            IgmpMessage::V1Report { group } => {
                body.put_u8(TYPE_V1_REPORT);
                body.put_u8(0);
                body.put_u16(0);
                body.put_ipv4(*group);
            }
            IgmpMessage::V2Report { group } => {
                body.put_u8(TYPE_V2_REPORT);
                body.put_u8(0);
                body.put_u16(0);
                body.put_ipv4(*group);
            }
            IgmpMessage::V2Leave { group } => {
                body.put_u8(TYPE_V2_LEAVE);
                body.put_u8(0);
                body.put_u16(0);
                body.put_ipv4(*group);
            }
            IgmpMessage::V3Report { records } => {
                body.put_u8(TYPE_V3_REPORT);
                body.put_u8(0);
                body.put_u16(0);
                body.put_u16(0);
                body.put_u16(records.len() as u16);
                for record in records {
                    body.put_u8(record.record_type.as_u8());
                    body.put_u8(0);
                    body.put_u16(record.sources.len() as u16);
                    body.put_ipv4(record.group);
                    for src in &record.sources {
                        body.put_ipv4(*src);
                    }
                }
            }
        }
        let sum = checksum(&body);
        body[2] = sum[0];
        body[3] = sum[1];
        buf.put_slice(&body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{Bytes, BytesMut};

    #[test]
    fn v2_report_round_trip() {
        let msg = IgmpMessage::V2Report {
            group: Ipv4Addr::new(239, 1, 1, 1),
        };
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = IgmpMessage::decode(&mut reader).unwrap();
        match decoded {
            IgmpMessage::V2Report { group } => assert_eq!(group, Ipv4Addr::new(239, 1, 1, 1)),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn v3_report_with_sources_round_trip() {
        let msg = IgmpMessage::V3Report {
            records: vec![GroupRecord {
                record_type: RecordType::ChangeToExclude,
                group: Ipv4Addr::new(239, 1, 1, 2),
                sources: vec![Ipv4Addr::new(192, 0, 2, 1)],
            }],
        };
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = IgmpMessage::decode(&mut reader).unwrap();
        match decoded {
            IgmpMessage::V3Report { records } => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].sources, vec![Ipv4Addr::new(192, 0, 2, 1)]);
            }
            _ => panic!("wrong variant"),
        }
    }
}

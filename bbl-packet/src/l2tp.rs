//
// L2TPv2: port 1701, header bit flags L/S/O/P, control
// AVPs for SCCRQ/SCCRP/SCCCN/StopCCN/Hello/ICRQ/ICRP/ICCN/CDN/WEN/CSUN/
// CSURQ/ZLB. Only the control-channel message types the LNS role actually
// needs are modeled; data-channel frames carry a PPP payload we treat
// opaquely (they are re-dispatched to `bbl_packet::ppp`).
//

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{need, DecodeError};

pub const FLAG_TYPE_CONTROL: u16 = 0x8000;
pub const FLAG_LENGTH: u16 = 0x4000;
pub const FLAG_SEQUENCE: u16 = 0x0800;
pub const FLAG_OFFSET: u16 = 0x0200;
pub const FLAG_PRIORITY: u16 = 0x0100;
pub const VERSION: u16 = 2;

#[derive(Clone, Debug)]
pub struct L2tpHeader {
    pub control: bool,
    pub tunnel_id: u16,
    pub session_id: u16,
    /// Present only when the sequence flag (control messages, always) is set.
    pub ns: Option<u16>,
    pub nr: Option<u16>,
}

impl L2tpHeader {
    pub fn decode(buf: &mut impl Buf) -> Result<(L2tpHeader, Bytes), DecodeError> {
        need(buf.remaining(), 6)?;
        let flags = buf.get_u16();
        if flags & 0x000f != VERSION {
            return Err(DecodeError::Malformed("l2tp version"));
        }
        let control = flags & FLAG_TYPE_CONTROL != 0;
        let has_length = flags & FLAG_LENGTH != 0;
        let has_sequence = flags & FLAG_SEQUENCE != 0;
        let has_offset = flags & FLAG_OFFSET != 0;
        let mut length = None;
        if has_length {
            need(buf.remaining(), 2)?;
            length = Some(buf.get_u16());
        }
        need(buf.remaining(), 4)?;
        let tunnel_id = buf.get_u16();
        let session_id = buf.get_u16();
        let mut ns = None;
        let mut nr = None;
        if has_sequence {
            need(buf.remaining(), 4)?;
            ns = Some(buf.get_u16());
            nr = Some(buf.get_u16());
        }
        if has_offset {
            need(buf.remaining(), 2)?;
            let offset_size = buf.get_u16() as usize;
            need(buf.remaining(), offset_size)?;
            buf.advance(offset_size);
        }
        let payload = if let Some(total) = length {
            // `total` counts the whole message from the flags field; the
            // fixed+variable header just consumed is not re-derivable here
            // without tracking bytes read, so we just take what remains -
            // callers pass us an exactly-framed buffer per packet.
            let _ = total;
            buf.copy_to_bytes(buf.remaining())
        } else {
            buf.copy_to_bytes(buf.remaining())
        };
        Ok((
            L2tpHeader {
                control,
                tunnel_id,
                session_id,
                ns,
                nr,
            },
            payload,
        ))
    }

    pub fn encode(&self, buf: &mut impl BufMut, payload_len: usize) {
        let mut flags = VERSION;
        if self.control {
            flags |= FLAG_TYPE_CONTROL | FLAG_LENGTH | FLAG_SEQUENCE;
        }
        buf.put_u16(flags);
        if self.control {
            let total = 12 + payload_len;
            buf.put_u16(total as u16);
        }
        buf.put_u16(self.tunnel_id);
        buf.put_u16(self.session_id);
        if self.control {
            buf.put_u16(self.ns.unwrap_or(0));
            buf.put_u16(self.nr.unwrap_or(0));
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MessageType {
    Sccrq,
    Sccrp,
    Scccn,
    StopCcn,
    Hello,
    Icrq,
    Icrp,
    Iccn,
    Cdn,
    Wen,
    Csun,
    Csurq,
}

impl MessageType {
    pub fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            1 => MessageType::Sccrq,
            2 => MessageType::Sccrp,
            3 => MessageType::Scccn,
            4 => MessageType::StopCcn,
            6 => MessageType::Hello,
            10 => MessageType::Icrq,
            11 => MessageType::Icrp,
            12 => MessageType::Iccn,
            14 => MessageType::Cdn,
            15 => MessageType::Wen,
            28 => MessageType::Csun,
            29 => MessageType::Csurq,
            _ => return None,
        })
    }

    pub fn as_u16(self) -> u16 {
        match self {
            MessageType::Sccrq => 1,
            MessageType::Sccrp => 2,
            MessageType::Scccn => 3,
            MessageType::StopCcn => 4,
            MessageType::Hello => 6,
            MessageType::Icrq => 10,
            MessageType::Icrp => 11,
            MessageType::Iccn => 12,
            MessageType::Cdn => 14,
            MessageType::Wen => 15,
            MessageType::Csun => 28,
            MessageType::Csurq => 29,
        }
    }
}

/// One AVP (Attribute-Value Pair), RFC 2661 §4.1. Vendor id 0 is IETF.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Avp {
    pub mandatory: bool,
    pub hidden: bool,
    pub vendor_id: u16,
    pub attr_type: u16,
    pub value: Vec<u8>,
}

pub const AVP_MESSAGE_TYPE: u16 = 0;
pub const AVP_RESULT_CODE: u16 = 1;
pub const AVP_PROTOCOL_VERSION: u16 = 2;
pub const AVP_FRAMING_CAPABILITIES: u16 = 3;
pub const AVP_HOST_NAME: u16 = 7;
pub const AVP_ASSIGNED_TUNNEL_ID: u16 = 9;
pub const AVP_RECEIVE_WINDOW_SIZE: u16 = 10;
pub const AVP_CHALLENGE: u16 = 11;
pub const AVP_CHALLENGE_RESPONSE: u16 = 13;
pub const AVP_ASSIGNED_SESSION_ID: u16 = 14;
pub const AVP_CALL_SERIAL_NUMBER: u16 = 15;
pub const AVP_PROXY_AUTHEN_TYPE: u16 = 29;
pub const AVP_PROXY_AUTHEN_NAME: u16 = 30;
pub const AVP_PROXY_AUTHEN_RESPONSE: u16 = 32;
pub const AVP_CALLING_NUMBER: u16 = 22;

/// A full L2TP control message: the parsed message type plus its AVP list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControlMessage {
    pub message_type: MessageType,
    pub avps: Vec<Avp>,
}

impl ControlMessage {
    pub fn avp(&self, attr_type: u16) -> Option<&Avp> {
        self.avps.iter().find(|a| a.attr_type == attr_type && a.vendor_id == 0)
    }

    pub fn decode(buf: &mut Bytes) -> Result<ControlMessage, DecodeError> {
        let mut avps = Vec::new();
        let mut message_type = None;
        while buf.remaining() >= 6 {
            let flags_len = buf.get_u16();
            let mandatory = flags_len & 0x8000 != 0;
            let hidden = flags_len & 0x4000 != 0;
            let avp_len = (flags_len & 0x03ff) as usize;
            if avp_len < 6 {
                return Err(DecodeError::Malformed("l2tp avp length"));
            }
            need(buf.remaining() + 6, avp_len)?;
            let vendor_id = buf.get_u16();
            let attr_type = buf.get_u16();
            let value = buf.copy_to_bytes(avp_len - 6).to_vec();
            if attr_type == AVP_MESSAGE_TYPE && vendor_id == 0 && value.len() >= 2 {
                let mt = u16::from_be_bytes([value[0], value[1]]);
                message_type = MessageType::from_u16(mt);
            }
            avps.push(Avp {
                mandatory,
                hidden,
                vendor_id,
                attr_type,
                value,
            });
        }
        Ok(ControlMessage {
            message_type: message_type.ok_or(DecodeError::Malformed("missing message type avp"))?,
            avps,
        })
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        let mut body = BytesMut::new();
        encode_avp(
            &Avp {
                mandatory: true,
                hidden: false,
                vendor_id: 0,
                attr_type: AVP_MESSAGE_TYPE,
                value: self.message_type.as_u16().to_be_bytes().to_vec(),
            },
            &mut body,
        );
        for avp in &self.avps {
            encode_avp(avp, &mut body);
        }
        buf.put_slice(&body);
    }
}

fn encode_avp(avp: &Avp, buf: &mut BytesMut) {
    let mut flags_len = (6 + avp.value.len()) as u16;
    if avp.mandatory {
        flags_len |= 0x8000;
    }
    if avp.hidden {
        flags_len |= 0x4000;
    }
    buf.put_u16(flags_len);
    buf.put_u16(avp.vendor_id);
    buf.put_u16(avp.attr_type);
    buf.put_slice(&avp.value);
}

pub fn avp_u16(attr_type: u16, v: u16) -> Avp {
    Avp {
        mandatory: true,
        hidden: false,
        vendor_id: 0,
        attr_type,
        value: v.to_be_bytes().to_vec(),
    }
}

pub fn avp_str(attr_type: u16, v: &str) -> Avp {
    Avp {
        mandatory: true,
        hidden: false,
        vendor_id: 0,
        attr_type,
        value: v.as_bytes().to_vec(),
    }
}

pub fn avp_bytes(attr_type: u16, v: &[u8]) -> Avp {
    Avp {
        mandatory: true,
        hidden: false,
        vendor_id: 0,
        attr_type,
        value: v.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_message_round_trip() {
        let msg = ControlMessage {
            message_type: MessageType::Sccrq,
            avps: vec![
                avp_u16(AVP_PROTOCOL_VERSION, 0x0100),
                avp_str(AVP_HOST_NAME, "tester"),
                avp_u16(AVP_ASSIGNED_TUNNEL_ID, 42),
            ],
        };
        let mut buf = BytesMut::new();
        msg.encode(&mut buf);
        let mut reader = Bytes::from(buf.freeze());
        let decoded = ControlMessage::decode(&mut reader).unwrap();
        assert_eq!(decoded.message_type, MessageType::Sccrq);
        let tunnel_id = decoded.avp(AVP_ASSIGNED_TUNNEL_ID).unwrap();
        assert_eq!(u16::from_be_bytes([tunnel_id.value[0], tunnel_id.value[1]]), 42);
    }

    #[test]
    fn header_round_trip_control() {
        let hdr = L2tpHeader {
            control: true,
            tunnel_id: 5,
            session_id: 0,
            ns: Some(1),
            nr: Some(2),
        };
        let mut buf = BytesMut::new();
        hdr.encode(&mut buf, 0);
        let mut reader = Bytes::from(buf.freeze());
        let (decoded, _) = L2tpHeader::decode(&mut reader).unwrap();
        assert!(decoded.control);
        assert_eq!(decoded.ns, Some(1));
        assert_eq!(decoded.nr, Some(2));
    }
}

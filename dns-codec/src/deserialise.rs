//! Deserialisation of DNS messages from the wire. See the `types` module
//! for details of the format.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::buffer::ConsumableBuffer;
use crate::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message cannot be parsed.
    pub fn from_octets(octets: &[u8]) -> Result<Self, DecodeError> {
        let mut buffer = ConsumableBuffer::new(octets);
        let wire_header = WireHeader::deserialise(&mut buffer)?;

        let mut questions = Vec::with_capacity(wire_header.qdcount.into());
        for _ in 0..wire_header.qdcount {
            questions.push(Question::deserialise(wire_header.header.id, &mut buffer)?);
        }
        let mut answers = Vec::with_capacity(wire_header.ancount.into());
        for _ in 0..wire_header.ancount {
            answers.push(ResourceRecord::deserialise(wire_header.header.id, &mut buffer)?);
        }
        let mut authority = Vec::with_capacity(wire_header.nscount.into());
        for _ in 0..wire_header.nscount {
            authority.push(ResourceRecord::deserialise(wire_header.header.id, &mut buffer)?);
        }
        let mut additional = Vec::with_capacity(wire_header.arcount.into());
        for _ in 0..wire_header.arcount {
            additional.push(ResourceRecord::deserialise(wire_header.header.id, &mut buffer)?);
        }

        Ok(Self {
            header: wire_header.header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

/// A `Header` as it appears on the wire: this also carries the section
/// counts, which the structured `Header` does not (they are implied by
/// the length of the corresponding `Vec`s once parsed).
struct WireHeader {
    header: Header,
    qdcount: u16,
    ancount: u16,
    nscount: u16,
    arcount: u16,
}

impl WireHeader {
    fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, DecodeError> {
        let id = buffer.next_u16().ok_or(DecodeError::CompletelyBusted)?;
        let flags1 = buffer.next_u8().ok_or(DecodeError::HeaderTooShort(id))?;
        let flags2 = buffer.next_u8().ok_or(DecodeError::HeaderTooShort(id))?;
        let qdcount = buffer.next_u16().ok_or(DecodeError::HeaderTooShort(id))?;
        let ancount = buffer.next_u16().ok_or(DecodeError::HeaderTooShort(id))?;
        let nscount = buffer.next_u16().ok_or(DecodeError::HeaderTooShort(id))?;
        let arcount = buffer.next_u16().ok_or(DecodeError::HeaderTooShort(id))?;

        Ok(Self {
            header: Header {
                id,
                is_response: flags1 & 0b1000_0000 != 0,
                opcode: Opcode::from((flags1 & 0b0111_1000) >> 3),
                is_authoritative: flags1 & 0b0000_0100 != 0,
                is_truncated: flags1 & 0b0000_0010 != 0,
                recursion_desired: flags1 & 0b0000_0001 != 0,
                recursion_available: flags2 & 0b1000_0000 != 0,
                rcode: Rcode::from(flags2 & 0b0000_1111),
            },
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, DecodeError> {
        let name = DomainName::deserialise(id, buffer)?;
        let qtype = QueryType::from(buffer.next_u16().ok_or(DecodeError::QuestionTooShort(id))?);
        let qclass = QueryClass::from(buffer.next_u16().ok_or(DecodeError::QuestionTooShort(id))?);

        Ok(Self { name, qtype, qclass })
    }
}

impl ResourceRecord {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, DecodeError> {
        let name = DomainName::deserialise(id, buffer)?;
        let rtype = RecordType::from(
            buffer
                .next_u16()
                .ok_or(DecodeError::ResourceRecordTooShort(id))?,
        );
        let rclass = RecordClass::from(
            buffer
                .next_u16()
                .ok_or(DecodeError::ResourceRecordTooShort(id))?,
        );
        let ttl = buffer
            .next_u32()
            .ok_or(DecodeError::ResourceRecordTooShort(id))?;
        let rdlength = buffer
            .next_u16()
            .ok_or(DecodeError::ResourceRecordTooShort(id))?;
        let rdata = buffer
            .take(rdlength.into())
            .ok_or(DecodeError::ResourceRecordTooShort(id))?;
        let mut rdata_buffer = ConsumableBuffer::new(rdata);

        let rtype_with_data = match rtype {
            RecordType::A => RecordTypeWithData::A {
                address: read_ipv4(id, &mut rdata_buffer)?,
            },
            RecordType::AAAA => RecordTypeWithData::AAAA {
                address: read_ipv6(id, &mut rdata_buffer)?,
            },
            RecordType::NS => RecordTypeWithData::NS {
                nsdname: DomainName::deserialise(id, &mut rdata_buffer)?,
            },
            RecordType::CNAME => RecordTypeWithData::CNAME {
                cname: DomainName::deserialise(id, &mut rdata_buffer)?,
            },
            RecordType::PTR => RecordTypeWithData::PTR {
                ptrdname: DomainName::deserialise(id, &mut rdata_buffer)?,
            },
            RecordType::SOA => RecordTypeWithData::SOA {
                mname: DomainName::deserialise(id, &mut rdata_buffer)?,
                rname: DomainName::deserialise(id, &mut rdata_buffer)?,
                serial: rdata_buffer
                    .next_u32()
                    .ok_or(DecodeError::ResourceRecordInvalid(id))?,
                refresh: rdata_buffer
                    .next_u32()
                    .ok_or(DecodeError::ResourceRecordInvalid(id))?,
                retry: rdata_buffer
                    .next_u32()
                    .ok_or(DecodeError::ResourceRecordInvalid(id))?,
                expire: rdata_buffer
                    .next_u32()
                    .ok_or(DecodeError::ResourceRecordInvalid(id))?,
                minimum: rdata_buffer
                    .next_u32()
                    .ok_or(DecodeError::ResourceRecordInvalid(id))?,
            },
            RecordType::MX => RecordTypeWithData::MX {
                preference: rdata_buffer
                    .next_u16()
                    .ok_or(DecodeError::ResourceRecordInvalid(id))?,
                exchange: DomainName::deserialise(id, &mut rdata_buffer)?,
            },
            RecordType::TXT => RecordTypeWithData::TXT {
                octets: rdata.to_vec(),
            },
            RecordType::Unknown(tag) => RecordTypeWithData::Unknown {
                tag,
                octets: rdata.to_vec(),
            },
        };

        Ok(Self {
            name,
            rtype_with_data,
            rclass,
            ttl,
        })
    }
}

fn read_ipv4(id: u16, buffer: &mut ConsumableBuffer) -> Result<Ipv4Addr, DecodeError> {
    let octets = buffer
        .take(4)
        .ok_or(DecodeError::ResourceRecordInvalid(id))?;
    Ok(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]))
}

fn read_ipv6(id: u16, buffer: &mut ConsumableBuffer) -> Result<Ipv6Addr, DecodeError> {
    let octets = buffer
        .take(16)
        .ok_or(DecodeError::ResourceRecordInvalid(id))?;
    let mut array = [0u8; 16];
    array.copy_from_slice(octets);
    Ok(Ipv6Addr::from(array))
}

impl DomainName {
    fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, DecodeError> {
        let mut octets = Vec::with_capacity(DOMAINNAME_MAX_LEN);
        let mut labels = Vec::with_capacity(5);
        let start = buffer.position();

        loop {
            let size = buffer.next_u8().ok_or(DecodeError::DomainTooShort(id))?;

            if usize::from(size) <= LABEL_MAX_LEN {
                octets.push(size);

                if size == 0 {
                    labels.push(Vec::new());
                    break;
                }

                let label = buffer
                    .take(size.into())
                    .ok_or(DecodeError::DomainTooShort(id))?;
                octets.extend_from_slice(label);
                labels.push(label.to_vec());

                if octets.len() > DOMAINNAME_MAX_LEN {
                    return Err(DecodeError::DomainTooLong(id));
                }
            } else if size >= 192 {
                // a compression pointer: RFC 1035 section 4.1.4. the
                // pointed-to name is parsed by re-entering this function
                // at an earlier offset in the same buffer.
                let hi = size & 0b0011_1111;
                let lo = buffer.next_u8().ok_or(DecodeError::DomainTooShort(id))?;
                let ptr = usize::from(u16::from_be_bytes([hi, lo]));

                if ptr >= start {
                    return Err(DecodeError::DomainPointerInvalid(id));
                }

                let mut pointee = DomainName::deserialise(id, &mut buffer.at_offset(ptr))?;
                octets.append(&mut pointee.octets);
                labels.append(&mut pointee.labels);
                break;
            } else {
                return Err(DecodeError::DomainLabelInvalid(id));
            }
        }

        if octets.len() <= DOMAINNAME_MAX_LEN {
            Ok(DomainName { octets, labels })
        } else {
            Err(DecodeError::DomainTooLong(id))
        }
    }
}

/// An error that can occur while parsing a [`Message`] from the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DecodeError {
    /// Not even two octets long, so there isn't even a valid ID to blame
    /// the error on.
    CompletelyBusted,
    HeaderTooShort(u16),
    QuestionTooShort(u16),
    ResourceRecordTooShort(u16),
    ResourceRecordInvalid(u16),
    DomainTooShort(u16),
    DomainTooLong(u16),
    DomainPointerInvalid(u16),
    DomainLabelInvalid(u16),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DecodeError::CompletelyBusted => write!(f, "message too short to contain an ID"),
            DecodeError::HeaderTooShort(id) => write!(f, "[{id}] header too short"),
            DecodeError::QuestionTooShort(id) => write!(f, "[{id}] question too short"),
            DecodeError::ResourceRecordTooShort(id) => {
                write!(f, "[{id}] resource record too short")
            }
            DecodeError::ResourceRecordInvalid(id) => write!(f, "[{id}] resource record invalid"),
            DecodeError::DomainTooShort(id) => write!(f, "[{id}] domain name too short"),
            DecodeError::DomainTooLong(id) => write!(f, "[{id}] domain name too long"),
            DecodeError::DomainPointerInvalid(id) => {
                write!(f, "[{id}] domain name compression pointer invalid")
            }
            DecodeError::DomainLabelInvalid(id) => write!(f, "[{id}] domain name label invalid"),
        }
    }
}

impl std::error::Error for DecodeError {}

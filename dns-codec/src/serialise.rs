//! Serialisation of DNS messages to the wire format. See the `types`
//! module for details of the format.

use crate::buffer::WritableBuffer;
use crate::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message has more than `u16::MAX` entries in any section, or
    /// a resource record's RDATA is too long to fit in the RDLENGTH field.
    pub fn into_octets(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), EncodeError> {
        let qdcount = usize_to_u16(self.questions.len())?;
        let ancount = usize_to_u16(self.answers.len())?;
        let nscount = usize_to_u16(self.authority.len())?;
        let arcount = usize_to_u16(self.additional.len())?;

        self.header.serialise(buffer);
        buffer.write_u16(qdcount);
        buffer.write_u16(ancount);
        buffer.write_u16(nscount);
        buffer.write_u16(arcount);

        for question in &self.questions {
            question.serialise(buffer);
        }
        for rr in &self.answers {
            rr.serialise(buffer)?;
        }
        for rr in &self.authority {
            rr.serialise(buffer)?;
        }
        for rr in &self.additional {
            rr.serialise(buffer)?;
        }

        Ok(())
    }
}

impl Header {
    fn serialise(&self, buffer: &mut WritableBuffer) {
        let flag_qr = if self.is_response { 0b1000_0000 } else { 0 };
        let field_opcode = 0b0111_1000 & (u8::from(self.opcode) << 3);
        let flag_aa = if self.is_authoritative { 0b0000_0100 } else { 0 };
        let flag_tc = if self.is_truncated { 0b0000_0010 } else { 0 };
        let flag_rd = if self.recursion_desired { 0b0000_0001 } else { 0 };

        let flag_ra = if self.recursion_available {
            0b1000_0000
        } else {
            0
        };
        let field_rcode = 0b0000_1111 & u8::from(self.rcode);

        buffer.write_u16(self.id);
        buffer.write_u8(flag_qr | field_opcode | flag_aa | flag_tc | flag_rd);
        buffer.write_u8(flag_ra | field_rcode);
    }
}

impl Question {
    fn serialise(&self, buffer: &mut WritableBuffer) {
        self.name.serialise(buffer);
        buffer.write_u16(self.qtype.into());
        buffer.write_u16(self.qclass.into());
    }
}

impl ResourceRecord {
    fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), EncodeError> {
        self.name.serialise(buffer);
        buffer.write_u16(self.rtype().into());
        buffer.write_u16(self.rclass.into());
        buffer.write_u32(self.ttl);

        let rdlength_index = buffer.index();
        buffer.write_u16(0);
        let rdata_start = buffer.index();

        match &self.rtype_with_data {
            RecordTypeWithData::A { address } => buffer.write_octets(&address.octets()),
            RecordTypeWithData::AAAA { address } => buffer.write_octets(&address.octets()),
            RecordTypeWithData::NS { nsdname } => nsdname.serialise(buffer),
            RecordTypeWithData::CNAME { cname } => cname.serialise(buffer),
            RecordTypeWithData::PTR { ptrdname } => ptrdname.serialise(buffer),
            RecordTypeWithData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                mname.serialise(buffer);
                rname.serialise(buffer);
                buffer.write_u32(*serial);
                buffer.write_u32(*refresh);
                buffer.write_u32(*retry);
                buffer.write_u32(*expire);
                buffer.write_u32(*minimum);
            }
            RecordTypeWithData::MX {
                preference,
                exchange,
            } => {
                buffer.write_u16(*preference);
                exchange.serialise(buffer);
            }
            RecordTypeWithData::TXT { octets } => buffer.write_octets(octets),
            RecordTypeWithData::Unknown { octets, .. } => buffer.write_octets(octets),
        }

        let rdlength = usize_to_u16(buffer.index() - rdata_start)?;
        buffer.patch_u16(rdlength_index, rdlength);

        Ok(())
    }
}

impl DomainName {
    /// Write the name in full, uncompressed form.
    ///
    /// TODO: implement compression (RFC 1035 section 4.1.4) - this'll need
    /// some extra state in `WritableBuffer` to track previously-written
    /// domains.
    fn serialise(&self, buffer: &mut WritableBuffer) {
        buffer.write_octets(&self.octets);
    }
}

/// An error that can occur while serialising a [`Message`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum EncodeError {
    /// A section, or an RDATA field, is too long to fit the wire format's
    /// 16 bit length field.
    CounterTooLarge { counter: usize, bits: u32 },
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EncodeError::CounterTooLarge { counter, bits } => {
                write!(f, "'{counter}' cannot be converted to a u{bits}")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

fn usize_to_u16(counter: usize) -> Result<u16, EncodeError> {
    u16::try_from(counter).map_err(|_| EncodeError::CounterTooLarge {
        counter,
        bits: u16::BITS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::test_util::*;
    use std::net::Ipv4Addr;

    #[test]
    fn header_roundtrips_through_deserialise() {
        let message = Message::from_question(
            1234,
            Question::new(domain("example.com."), QueryType::Record(RecordType::A)),
        );
        let octets = message.into_octets().unwrap();
        let parsed = Message::from_octets(&octets).unwrap();
        assert_eq!(message.header.id, parsed.header.id);
        assert_eq!(message.questions, parsed.questions);
    }

    #[test]
    fn sets_rdlength() {
        let mut buffer = WritableBuffer::default();
        let rr = ResourceRecord {
            name: domain("www.example.com."),
            rtype_with_data: RecordTypeWithData::A {
                address: Ipv4Addr::new(1, 2, 3, 4),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        };
        rr.serialise(&mut buffer).unwrap();

        let rdlength_index = buffer.octets.len() - 4 - 2;
        let rdlength = u16::from_be_bytes([
            buffer.octets[rdlength_index],
            buffer.octets[rdlength_index + 1],
        ]);
        assert_eq!(4, rdlength);
    }
}

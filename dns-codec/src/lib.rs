//! Wire format for DNS messages (RFC 1035).
//!
//! This is the "external collaborator" a stub resolver treats as out of
//! scope for its own logic: packing a [`Question`] into bytes, and parsing
//! bytes back into a [`Message`]. It covers the record types, opcodes, and
//! response codes a stub resolver needs to inspect, not the full RFC 1035
//! vocabulary (no SRV/HINFO/MINFO/mailbox records, no write-side name
//! compression).

pub mod buffer;
pub mod deserialise;
pub mod serialise;
pub mod types;

pub use types::*;

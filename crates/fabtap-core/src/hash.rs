//! Block hash engine.
//!
//! A Fabric block hash is `SHA-256(DER(SEQUENCE { number INTEGER,
//! previousHash OCTET STRING, dataHash OCTET STRING }))`. The encoding must be
//! byte-for-byte identical to what peers produce, so the three fields are
//! always written in that order and empty byte strings are still emitted.

use sha2::{Digest, Sha256};

use crate::error::HashError;
use crate::proto::BlockHeader;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_SEQUENCE: u8 = 0x30;

/// Compute the hash of a block header.
pub fn block_hash(header: &BlockHeader) -> Result<Vec<u8>, HashError> {
    let der = encode_header(header.number, &header.previous_hash, &header.data_hash)?;
    Ok(Sha256::digest(&der).to_vec())
}

/// DER-encode the header record that [`block_hash`] digests.
pub fn encode_header(
    number: u64,
    previous_hash: &[u8],
    data_hash: &[u8],
) -> Result<Vec<u8>, HashError> {
    let number = i64::try_from(number).map_err(|_| HashError::EncodingRange { number })?;

    let mut body = Vec::with_capacity(previous_hash.len() + data_hash.len() + 16);
    write_tlv(&mut body, TAG_INTEGER, &integer_content(number));
    write_tlv(&mut body, TAG_OCTET_STRING, previous_hash);
    write_tlv(&mut body, TAG_OCTET_STRING, data_hash);

    let mut out = Vec::with_capacity(body.len() + 4);
    write_tlv(&mut out, TAG_SEQUENCE, &body);
    Ok(out)
}

/// Minimal two's-complement big-endian content octets.
fn integer_content(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

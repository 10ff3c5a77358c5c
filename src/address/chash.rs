//! Checksummed hash encoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use data_encoding::BASE32;
use ripemd::{Digest, Ripemd160};

use crate::address::types::{ChashError, ChashLength, ChashResult};
use crate::hashing::sha256;

/// Encode a raw digest of `length.clean_bytes()` bytes.
pub fn encode(clean: &[u8], length: ChashLength) -> ChashResult<String> {
    if clean.len() != length.clean_bytes() {
        return Err(ChashError::DataLength {
            expected: length.clean_bytes(),
            actual: clean.len(),
        });
    }
    Ok(encode_clean(clean, length))
}

/// 160-bit chash of arbitrary data (RIPEMD-160, first 4 bytes dropped).
pub fn chash160(data: &[u8]) -> String {
    let digest = Ripemd160::digest(data);
    encode_clean(&digest[4..], ChashLength::Bits160)
}

/// 288-bit chash of arbitrary data (SHA-256).
pub fn chash288(data: &[u8]) -> String {
    encode_clean(&sha256(data), ChashLength::Bits288)
}

/// Check the embedded checksum.
///
/// Fails only on lengths other than 32 or 48 characters; text that does
/// not decode or carries a wrong checksum yields `Ok(false)`.
pub fn is_valid(encoded: &str) -> ChashResult<bool> {
    let (decoded, length) = match encoded.chars().count() {
        32 => (BASE32.decode(encoded.as_bytes()).ok(), ChashLength::Bits160),
        48 => (STANDARD.decode(encoded).ok(), ChashLength::Bits288),
        other => return Err(ChashError::EncodedLength(other)),
    };
    let Some(mixed) = decoded else {
        return Ok(false);
    };
    if mixed.len() * 8 != length.bits() {
        return Ok(false);
    }
    let (clean, embedded) = separate(&mixed, length.offsets());
    Ok(embedded == checksum(&clean))
}

/// Address check: 32 uppercase characters with a valid checksum.
pub fn is_valid_address(text: &str) -> bool {
    text.len() == 32 && text.to_uppercase() == text && matches!(is_valid(text), Ok(true))
}

fn encode_clean(clean: &[u8], length: ChashLength) -> String {
    let mixed = mix(clean, &checksum(clean), length.offsets());
    match length {
        ChashLength::Bits160 => BASE32.encode(&mixed),
        ChashLength::Bits288 => STANDARD.encode(&mixed),
    }
}

fn checksum(clean: &[u8]) -> [u8; 4] {
    let digest = sha256(clean);
    [digest[5], digest[13], digest[21], digest[29]]
}

fn mix(clean: &[u8], checksum: &[u8; 4], offsets: &[usize; 32]) -> Vec<u8> {
    let total_bits = clean.len() * 8 + 32;
    let mut mixed = vec![0u8; total_bits / 8];
    let mut clean_pos = 0;
    let mut checksum_pos = 0;
    for pos in 0..total_bits {
        let bit = if checksum_pos < offsets.len() && offsets[checksum_pos] == pos {
            checksum_pos += 1;
            get_bit(checksum, checksum_pos - 1)
        } else {
            clean_pos += 1;
            get_bit(clean, clean_pos - 1)
        };
        if bit {
            set_bit(&mut mixed, pos);
        }
    }
    mixed
}

fn separate(mixed: &[u8], offsets: &[usize; 32]) -> (Vec<u8>, [u8; 4]) {
    let total_bits = mixed.len() * 8;
    let mut clean = vec![0u8; (total_bits - 32) / 8];
    let mut checksum = [0u8; 4];
    let mut clean_pos = 0;
    let mut checksum_pos = 0;
    for pos in 0..total_bits {
        let bit = get_bit(mixed, pos);
        if checksum_pos < offsets.len() && offsets[checksum_pos] == pos {
            if bit {
                set_bit(&mut checksum, checksum_pos);
            }
            checksum_pos += 1;
        } else {
            if bit {
                set_bit(&mut clean, clean_pos);
            }
            clean_pos += 1;
        }
    }
    (clean, checksum)
}

fn get_bit(bytes: &[u8], index: usize) -> bool {
    (bytes[index / 8] >> (7 - index % 8)) & 1 == 1
}

fn set_bit(bytes: &mut [u8], index: usize) {
    bytes[index / 8] |= 1 << (7 - index % 8);
}

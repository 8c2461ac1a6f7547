//! Legacy CryptoAPI `PRIVATEKEYBLOB` layout for RSA signing keys (`.snk` files).
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! PUBLICKEYSTRUC  bType u8, bVersion u8, reserved u16, aiKeyAlg u32
//! RSAPUBKEY       magic u32, bitlen u32, pubexp u32
//! modulus         bitlen/8
//! prime1          bitlen/16
//! prime2          bitlen/16
//! exponent1       bitlen/16
//! exponent2       bitlen/16
//! coefficient     bitlen/16
//! privateExponent bitlen/8
//! ```

use byteorder::{LittleEndian, WriteBytesExt};
use thiserror::Error;

pub const PRIVATE_KEY_BLOB: u8 = 0x07;
pub const BLOB_VERSION: u8 = 0x02;
pub const CALG_RSA_SIGN: u32 = 0x0000_2400;
/// "RSA2" read as a little-endian dword.
pub const MAGIC_RSA2: u32 = 0x3241_5352;

/// Size of PUBLICKEYSTRUC + RSAPUBKEY.
pub const HEADER_LEN: usize = 20;

/// RSA private key components as big-endian unsigned magnitudes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyParts {
    pub bit_len: u32,
    pub public_exponent: Vec<u8>,
    pub modulus: Vec<u8>,
    pub prime1: Vec<u8>,
    pub prime2: Vec<u8>,
    pub exponent1: Vec<u8>,
    pub exponent2: Vec<u8>,
    pub coefficient: Vec<u8>,
    pub private_exponent: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum KeyBlobError {
    #[error("key length {0} is not a positive multiple of 16 bits")]
    BitLength(u32),
    #[error("{field} is {len} bytes, wider than its {width}-byte slot")]
    FieldTooWide {
        field: &'static str,
        len: usize,
        width: usize,
    },
    #[error("public exponent does not fit in a dword")]
    ExponentTooWide,
    #[error("write key blob: {0}")]
    Io(#[from] std::io::Error),
}

/// Total blob length for a key of `bit_len` bits.
pub fn blob_len(bit_len: u32) -> usize {
    let full = bit_len as usize / 8;
    let half = bit_len as usize / 16;
    HEADER_LEN + 2 * full + 5 * half
}

/// Serialize `parts` into a `PRIVATEKEYBLOB`.
pub fn encode_private_key_blob(parts: &RsaKeyParts) -> Result<Vec<u8>, KeyBlobError> {
    if parts.bit_len == 0 || parts.bit_len % 16 != 0 {
        return Err(KeyBlobError::BitLength(parts.bit_len));
    }
    let full = parts.bit_len as usize / 8;
    let half = parts.bit_len as usize / 16;

    let mut blob = Vec::with_capacity(blob_len(parts.bit_len));
    blob.write_u8(PRIVATE_KEY_BLOB)?;
    blob.write_u8(BLOB_VERSION)?;
    blob.write_u16::<LittleEndian>(0)?;
    blob.write_u32::<LittleEndian>(CALG_RSA_SIGN)?;

    blob.write_u32::<LittleEndian>(MAGIC_RSA2)?;
    blob.write_u32::<LittleEndian>(parts.bit_len)?;
    blob.write_u32::<LittleEndian>(bytes_to_dword(&parts.public_exponent)?)?;

    write_reversed(&mut blob, "modulus", &parts.modulus, full)?;
    write_reversed(&mut blob, "prime1", &parts.prime1, half)?;
    write_reversed(&mut blob, "prime2", &parts.prime2, half)?;
    write_reversed(&mut blob, "exponent1", &parts.exponent1, half)?;
    write_reversed(&mut blob, "exponent2", &parts.exponent2, half)?;
    write_reversed(&mut blob, "coefficient", &parts.coefficient, half)?;
    write_reversed(&mut blob, "private exponent", &parts.private_exponent, full)?;

    Ok(blob)
}

/// Fold a big-endian magnitude into a `u32`.
fn bytes_to_dword(bytes: &[u8]) -> Result<u32, KeyBlobError> {
    let significant = strip_leading_zeros(bytes);
    if significant.len() > 4 {
        return Err(KeyBlobError::ExponentTooWide);
    }
    Ok(significant
        .iter()
        .fold(0u32, |dword, byte| (dword << 8) | u32::from(*byte)))
}

/// Append a big-endian magnitude as little-endian, zero-padded to `width`.
fn write_reversed(
    blob: &mut Vec<u8>,
    field: &'static str,
    big_endian: &[u8],
    width: usize,
) -> Result<(), KeyBlobError> {
    let significant = strip_leading_zeros(big_endian);
    if significant.len() > width {
        return Err(KeyBlobError::FieldTooWide {
            field,
            len: significant.len(),
            width,
        });
    }
    blob.extend(significant.iter().rev());
    blob.resize(blob.len() + width - significant.len(), 0);
    Ok(())
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(bit_len: u32) -> RsaKeyParts {
        let full = bit_len as usize / 8;
        let half = bit_len as usize / 16;
        RsaKeyParts {
            bit_len,
            public_exponent: vec![0x01, 0x00, 0x01],
            modulus: vec![0xAA; full],
            prime1: vec![0x11; half],
            prime2: vec![0x22; half],
            exponent1: vec![0x33; half],
            exponent2: vec![0x44; half],
            coefficient: vec![0x55; half],
            private_exponent: vec![0x66; full],
        }
    }

    #[test]
    fn header_matches_capi_layout() {
        let blob = encode_private_key_blob(&parts(64)).expect("encode");
        assert_eq!(
            &blob[..HEADER_LEN],
            &[
                0x07, 0x02, 0x00, 0x00, // bType, bVersion, reserved
                0x00, 0x24, 0x00, 0x00, // CALG_RSA_SIGN
                0x52, 0x53, 0x41, 0x32, // "RSA2"
                0x40, 0x00, 0x00, 0x00, // bitlen = 64
                0x01, 0x00, 0x01, 0x00, // pubexp = 65537
            ]
        );
        assert_eq!(blob.len(), blob_len(64));
    }

    #[test]
    fn components_are_reversed_and_placed_in_order() {
        let mut p = parts(64);
        p.modulus = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let blob = encode_private_key_blob(&p).expect("encode");

        let body = &blob[HEADER_LEN..];
        assert_eq!(&body[..8], &[8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(&body[8..12], &[0x11; 4]);
        assert_eq!(&body[12..16], &[0x22; 4]);
        assert_eq!(&body[16..20], &[0x33; 4]);
        assert_eq!(&body[20..24], &[0x44; 4]);
        assert_eq!(&body[24..28], &[0x55; 4]);
        assert_eq!(&body[28..36], &[0x66; 8]);
    }

    #[test]
    fn short_components_are_zero_padded_at_the_high_end() {
        let mut p = parts(64);
        p.prime1 = vec![0x00, 0x01, 0x02];
        let blob = encode_private_key_blob(&p).expect("encode");
        let prime1 = &blob[HEADER_LEN + 8..HEADER_LEN + 12];
        assert_eq!(prime1, &[0x02, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn rejects_component_wider_than_slot() {
        let mut p = parts(64);
        p.prime2 = vec![0xFF; 5];
        let err = encode_private_key_blob(&p).unwrap_err();
        assert!(matches!(
            err,
            KeyBlobError::FieldTooWide {
                field: "prime2",
                len: 5,
                width: 4
            }
        ));
    }

    #[test]
    fn rejects_bit_length_not_multiple_of_16() {
        let mut p = parts(64);
        p.bit_len = 72;
        assert!(matches!(
            encode_private_key_blob(&p).unwrap_err(),
            KeyBlobError::BitLength(72)
        ));
    }

    #[test]
    fn exponent_wider_than_dword_is_rejected() {
        assert_eq!(bytes_to_dword(&[0, 0, 0, 0, 0x01, 0x00, 0x01]).expect("fits"), 65537);
        assert!(matches!(
            bytes_to_dword(&[1, 0, 0, 0, 0]),
            Err(KeyBlobError::ExponentTooWide)
        ));
    }
}

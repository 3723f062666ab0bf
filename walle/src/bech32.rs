//! Bech32 / Bech32m encoding (BIP-173, BIP-350).
//!
//! The checksum is a BCH code over GF(32): a 30-bit register is shifted five
//! bits at a time and, depending on the five bits shifted out, XORed with
//! precomputed multiples of the generator
//! `x^6 + {29}x^5 + {22}x^4 + {20}x^3 + {21}x^2 + {29}x + {18}`.

use crate::error::{Error, Result};

/// Data-part alphabet, indexed by 5-bit value.
pub const CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// Separator between the human-readable part and the data part.
pub const SEPARATOR: char = '1';

/// Number of 5-bit checksum symbols.
pub const CHECKSUM_LEN: usize = 6;

/// Maximum total length of an encoded string.
pub const MAX_LEN: usize = 90;

const GENERATOR: [u32; 5] = [0x3b6a57b2, 0x26508e6d, 0x1ea119fa, 0x3d4233dd, 0x2a1462b3];

/// Checksum flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// BIP-173, used for witness version 0.
    Bech32,
    /// BIP-350, used for witness versions 1 through 16.
    Bech32m,
}

impl Variant {
    /// Constant the polymod residue is XORed with.
    pub const fn constant(self) -> u32 {
        match self {
            Self::Bech32 => 1,
            Self::Bech32m => 0x2bc830a3,
        }
    }

    fn from_residue(residue: u32) -> Option<Self> {
        match residue {
            1 => Some(Self::Bech32),
            0x2bc830a3 => Some(Self::Bech32m),
            _ => None,
        }
    }
}

/// BCH checksum register over a sequence of 5-bit values.
pub fn polymod(values: &[u8]) -> u32 {
    let mut chk: u32 = 1;
    for &v in values {
        let top = chk >> 25;
        chk = ((chk & 0x1ff_ffff) << 5) ^ u32::from(v);
        for (i, g) in GENERATOR.iter().enumerate() {
            if (top >> i) & 1 == 1 {
                chk ^= g;
            }
        }
    }
    chk
}

/// Expand the human-readable part for checksum computation.
///
/// High three bits of each character, a zero, then the low five bits of each
/// character.
pub fn expand_hrp(hrp: &str) -> Vec<u8> {
    let bytes = hrp.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() * 2 + 1);
    out.extend(bytes.iter().map(|b| b >> 5));
    out.push(0);
    out.extend(bytes.iter().map(|b| b & 0x1f));
    out
}

/// Compute the six checksum symbols for `hrp` and 5-bit `data`.
pub fn create_checksum(hrp: &str, data: &[u8], variant: Variant) -> [u8; CHECKSUM_LEN] {
    let mut values = expand_hrp(hrp);
    values.extend_from_slice(data);
    values.extend_from_slice(&[0u8; CHECKSUM_LEN]);
    let residue = polymod(&values) ^ variant.constant();

    let mut checksum = [0u8; CHECKSUM_LEN];
    for (i, symbol) in checksum.iter_mut().enumerate() {
        *symbol = ((residue >> (5 * (5 - i))) & 31) as u8;
    }
    checksum
}

/// Check `data` (including its trailing checksum) against `hrp`.
///
/// Returns the matching variant, or `None` if the checksum is invalid.
pub fn verify_checksum(hrp: &str, data: &[u8]) -> Option<Variant> {
    let mut values = expand_hrp(hrp);
    values.extend_from_slice(data);
    Variant::from_residue(polymod(&values))
}

/// Verify a complete encoded string against an expected `hrp`.
///
/// Returns `None` for any string that is not a valid encoding under `hrp`,
/// including mixed-case strings, strings over 90 characters and characters
/// outside the alphabet.
pub fn verify(hrp: &str, encoded: &str) -> Option<Variant> {
    check_shape(encoded).ok()?;
    let lower = encoded.to_ascii_lowercase();
    let rest = lower.strip_prefix(&hrp.to_ascii_lowercase())?;
    let data_part = rest.strip_prefix(SEPARATOR)?;
    if data_part.len() < CHECKSUM_LEN {
        return None;
    }
    let data = data_part
        .bytes()
        .map(charset_value)
        .collect::<Option<Vec<u8>>>()?;
    verify_checksum(&hrp.to_ascii_lowercase(), &data)
}

/// Length, character range and single-case rules shared by every decoder.
fn check_shape(encoded: &str) -> Result<()> {
    if encoded.len() < 8 || encoded.len() > MAX_LEN {
        return Err(Error::InvalidLength {
            expected: MAX_LEN,
            actual: encoded.len(),
        });
    }
    if !encoded.bytes().all(|c| (33..=126).contains(&c)) {
        return Err(Error::InvalidEncoding);
    }
    let has_lower = encoded.bytes().any(|c| c.is_ascii_lowercase());
    let has_upper = encoded.bytes().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Err(Error::MalformedInput("mixed case"));
    }
    Ok(())
}

fn charset_value(c: u8) -> Option<u8> {
    CHARSET.iter().position(|&x| x == c).map(|p| p as u8)
}

/// Regroup bits from `from`-bit words into `to`-bit words, MSB first.
///
/// With `pad`, a final partial group is zero-filled. Without it, leftover bits
/// must be fewer than `from` and all zero.
pub fn convert_bits(data: &[u8], from: u32, to: u32, pad: bool) -> Result<Vec<u8>> {
    let maxv: u32 = (1 << to) - 1;
    let max_acc: u32 = (1 << (from + to - 1)) - 1;
    let mut acc: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(data.len() * from as usize / to as usize + 1);

    for &value in data {
        let v = u32::from(value);
        if v >> from != 0 {
            return Err(Error::InvalidEncoding);
        }
        acc = ((acc << from) | v) & max_acc;
        bits += from;
        while bits >= to {
            bits -= to;
            out.push(((acc >> bits) & maxv) as u8);
        }
    }

    if pad {
        if bits > 0 {
            out.push(((acc << (to - bits)) & maxv) as u8);
        }
    } else if bits >= from || ((acc << (to - bits)) & maxv) != 0 {
        return Err(Error::MalformedInput("non-zero padding"));
    }
    Ok(out)
}

fn check_hrp(hrp: &str) -> Result<()> {
    if hrp.is_empty() || hrp.len() > 83 {
        return Err(Error::MalformedInput("human-readable part length"));
    }
    if !hrp.bytes().all(|c| (33..=126).contains(&c)) {
        return Err(Error::InvalidEncoding);
    }
    Ok(())
}

/// Encode 5-bit `data` under `hrp` with a checksum of the given variant.
pub fn encode(hrp: &str, data: &[u8], variant: Variant) -> Result<String> {
    check_hrp(hrp)?;
    let hrp = hrp.to_ascii_lowercase();
    let total = hrp.len() + 1 + data.len() + CHECKSUM_LEN;
    if total > MAX_LEN {
        return Err(Error::InvalidLength {
            expected: MAX_LEN,
            actual: total,
        });
    }

    let checksum = create_checksum(&hrp, data, variant);
    let mut out = String::with_capacity(total);
    out.push_str(&hrp);
    out.push(SEPARATOR);
    for &v in data.iter().chain(checksum.iter()) {
        let c = CHARSET.get(v as usize).ok_or(Error::InvalidEncoding)?;
        out.push(*c as char);
    }
    Ok(out)
}

/// Decode a Bech32 or Bech32m string.
///
/// Returns the lowercase hrp, the 5-bit data without checksum, and the variant.
pub fn decode(encoded: &str) -> Result<(String, Vec<u8>, Variant)> {
    check_shape(encoded)?;

    let lower = encoded.to_ascii_lowercase();
    let pos = lower
        .rfind(SEPARATOR)
        .ok_or(Error::MalformedInput("missing separator"))?;
    if pos == 0 || pos + 1 + CHECKSUM_LEN > lower.len() {
        return Err(Error::MalformedInput("separator position"));
    }

    let (hrp, rest) = lower.split_at(pos);
    let data = rest[1..]
        .bytes()
        .map(charset_value)
        .collect::<Option<Vec<u8>>>()
        .ok_or(Error::InvalidEncoding)?;

    let variant = verify_checksum(hrp, &data).ok_or(Error::InvalidChecksum)?;
    let payload = data[..data.len() - CHECKSUM_LEN].to_vec();
    Ok((hrp.to_string(), payload, variant))
}

/// Encode a segwit address for `witness_version` and `program`.
pub fn segwit_encode(hrp: &str, witness_version: u8, program: &[u8]) -> Result<String> {
    check_program(witness_version, program)?;
    let variant = if witness_version == 0 {
        Variant::Bech32
    } else {
        Variant::Bech32m
    };

    let mut data = Vec::with_capacity(1 + (program.len() * 8).div_ceil(5));
    data.push(witness_version);
    data.extend(convert_bits(program, 8, 5, true)?);
    encode(hrp, &data, variant)
}

/// Decode a segwit address, requiring the given `hrp`.
///
/// Returns the witness version and program.
pub fn segwit_decode(hrp: &str, address: &str) -> Result<(u8, Vec<u8>)> {
    let (got_hrp, data, variant) = decode(address)?;
    if got_hrp != hrp.to_ascii_lowercase() {
        return Err(Error::MalformedInput("unexpected human-readable part"));
    }
    let (&witness_version, rest) = data
        .split_first()
        .ok_or(Error::MalformedInput("empty data part"))?;

    let program = convert_bits(rest, 5, 8, false)?;
    check_program(witness_version, &program)?;

    let expected = if witness_version == 0 {
        Variant::Bech32
    } else {
        Variant::Bech32m
    };
    if variant != expected {
        return Err(Error::InvalidChecksum);
    }
    Ok((witness_version, program))
}

fn check_program(witness_version: u8, program: &[u8]) -> Result<()> {
    if witness_version > 16 {
        return Err(Error::MalformedInput("witness version"));
    }
    if program.len() < 2 || program.len() > 40 {
        return Err(Error::MalformedInput("witness program length"));
    }
    if witness_version == 0 && program.len() != 20 && program.len() != 32 {
        return Err(Error::MalformedInput("witness v0 program length"));
    }
    Ok(())
}

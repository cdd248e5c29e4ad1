/*
 * This file is part of psumon.
 *
 * Copyright (C) 2025 psumon contributors
 *
 * psumon is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 2 of the License, or
 * (at your option) any later version.
 *
 * psumon is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with psumon. If not, see <https://www.gnu.org/licenses/>.
 */

//! Register decoding
//!
//! Pure conversions from raw PMBus register bit patterns into signed integers,
//! scaled physical values and strings. Nothing here touches the bus or the cache.
//!
//! # Numeric formats
//!
//! - **LINEAR11**: 5-bit signed exponent in bits 15-11, 11-bit signed mantissa in
//!   bits 10-0, value = mantissa * 2^exponent.
//! - **LINEAR16 with VOUT_MODE**: the word is an unsigned mantissa and the exponent
//!   lives in the low five bits of the VOUT_MODE register.
//!
//! Negative exponents divide with truncation toward zero after the unit multiplier
//! is applied, which matches what the hardware vendors' tools print.

/// Interpret the low `width` bits of `value` (selected by `mask`) as two's complement.
pub fn twos_complement(value: u16, width: u8, mask: u16) -> i32 {
    debug_assert!((1..=16).contains(&width));
    let field = value & mask;
    let negative = (field >> (width - 1)) != 0;

    if negative {
        -((((!field) & mask) as i32) + 1)
    } else {
        field as i32
    }
}

/// Split a LINEAR11 word into `(mantissa, exponent)`.
pub fn linear11_parts(raw: u16) -> (i32, i32) {
    let exponent = twos_complement(raw >> 11, 5, 0x1F);
    let mantissa = twos_complement(raw & 0x7FF, 11, 0x7FF);
    (mantissa, exponent)
}

/// Decode a LINEAR11 word and rescale it by `multiplier`.
pub fn linear11(raw: u16, multiplier: i64) -> i64 {
    let (mantissa, exponent) = linear11_parts(raw);
    scale(mantissa as i64, exponent, multiplier)
}

/// Decode an unsigned LINEAR16 word using the exponent held in `vout_mode`.
pub fn linear16(raw: u16, vout_mode: u8, multiplier: i64) -> i64 {
    let exponent = twos_complement(vout_mode as u16, 5, 0x1F);
    scale(raw as i64, exponent, multiplier)
}

fn scale(mantissa: i64, exponent: i32, multiplier: i64) -> i64 {
    if exponent >= 0 {
        (mantissa << exponent) * multiplier
    } else {
        (mantissa * multiplier) / (1i64 << -exponent)
    }
}

/// Pack a mantissa and exponent into a LINEAR11 word.
///
/// Mantissa is truncated to 11 bits and exponent to 5 bits; callers are expected
/// to stay within -1024..=1023 and -16..=15.
pub fn encode_linear11(mantissa: i16, exponent: i8) -> u16 {
    let exp_bits = ((exponent as i16 as u16) & 0x1F) << 11;
    let mant_bits = (mantissa as u16) & 0x7FF;
    exp_bits | mant_bits
}

/// Decode a length-prefixed block read into a string.
///
/// `raw` starts with the count byte as it came off the wire. `capacity` is the size
/// of the destination buffer in the register layout, count byte and terminator
/// included, so at most `capacity - 2` characters survive. Decoding also stops at
/// the first NUL and at the end of what was actually read.
pub fn block_string(raw: &[u8], capacity: usize) -> String {
    let max_chars = capacity.saturating_sub(2);
    let payload = raw.get(1..).unwrap_or(&[]);
    let end = payload
        .iter()
        .take(max_chars)
        .position(|&b| b == 0)
        .unwrap_or_else(|| payload.len().min(max_chars));

    String::from_utf8_lossy(&payload[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::multiplier;

    #[test]
    fn test_twos_complement_all_bits_set() {
        assert_eq!(twos_complement(0x1F, 5, 0x1F), -1);
        assert_eq!(twos_complement(0x7FF, 11, 0x7FF), -1);
    }

    #[test]
    fn test_twos_complement_width_dependent() {
        // Same bits, different field width
        assert_eq!(twos_complement(0x0F, 4, 0x0F), -1);
        assert_eq!(twos_complement(0x0F, 5, 0x1F), 15);
        assert_eq!(twos_complement(0x0F, 6, 0x3F), 15);
        assert_eq!(twos_complement(0x10, 5, 0x1F), -16);
    }

    #[test]
    fn test_twos_complement_masks_high_bits() {
        // Bits above the mask never leak into the result
        assert_eq!(twos_complement(0xFFE1, 5, 0x1F), 1);
        assert_eq!(twos_complement(0x0400, 11, 0x7FF), -1024);
    }

    #[test]
    fn test_linear11_negative_exponent_truncates() {
        // exponent -1, mantissa 444
        assert_eq!(linear11(0xF9BC, multiplier::MILLI), 222_000);
        // exponent -1, mantissa 956
        assert_eq!(linear11(0xFBBC, multiplier::MILLI), 478_000);
        // 3 * 2^-1 = 1.5 -> 1 at unit scale
        assert_eq!(linear11(encode_linear11(3, -1), multiplier::UNIT), 1);
        // -3 * 2^-1 = -1.5 -> -1 (toward zero)
        assert_eq!(linear11(encode_linear11(-3, -1), multiplier::UNIT), -1);
    }

    #[test]
    fn test_linear11_non_negative_exponent() {
        assert_eq!(linear11(encode_linear11(25, 0), multiplier::UNIT), 25);
        assert_eq!(linear11(encode_linear11(25, 3), multiplier::UNIT), 200);
        assert_eq!(linear11(encode_linear11(-7, 2), multiplier::MILLI), -28_000);
    }

    #[test]
    fn test_linear11_encode_decode_property() {
        for exponent in -16i8..=15 {
            for mantissa in [-1024i16, -513, -1, 0, 1, 2, 77, 511, 1023] {
                let raw = encode_linear11(mantissa, exponent);
                let expected = if exponent >= 0 {
                    (mantissa as i64) << exponent
                } else {
                    (mantissa as i64) / (1i64 << -(exponent as i32))
                };
                assert_eq!(linear11(raw, multiplier::UNIT), expected, "raw {:#06x}", raw);
                assert_eq!(linear11_parts(raw), (mantissa as i32, exponent as i32));
            }
        }
    }

    #[test]
    fn test_linear11_fault_sentinel() {
        assert_eq!(linear11(0x3FF, multiplier::UNIT), 1023);
        assert_eq!(linear11(0x3FF, multiplier::MILLI), 1_023_000);
    }

    #[test]
    fn test_linear16_uses_mode_exponent() {
        // VOUT_MODE 0x17 -> exponent -9; 0x1800 / 512 = 12 V
        assert_eq!(linear16(0x1800, 0x17, multiplier::MILLI), 12_000);
        // Only the low five bits of VOUT_MODE matter
        assert_eq!(linear16(0x1800, 0x37, multiplier::MILLI), 12_000);
        // Full 16-bit mantissa is unsigned
        assert_eq!(linear16(0xFFFF, 0x00, multiplier::UNIT), 65_535);
        assert_eq!(linear16(3, 0x02, multiplier::UNIT), 12);
    }

    #[test]
    fn test_block_string_strips_count_byte() {
        let raw = [8, b'Y', b'M', b'-', b'2', b'6', b'5', b'1', b'Y'];
        assert_eq!(block_string(&raw, 10), "YM-2651Y");
    }

    #[test]
    fn test_block_string_capacity_limit() {
        let mut raw = vec![20u8];
        raw.extend_from_slice(b"ABCDEFGHIJKLMNOPQRST");
        // 16-byte buffer keeps 14 characters
        assert_eq!(block_string(&raw, 16), "ABCDEFGHIJKLMN");
    }

    #[test]
    fn test_block_string_stops_at_nul_and_short_reads() {
        assert_eq!(block_string(&[4, b'F', b'2', 0, b'X'], 5), "F2");
        assert_eq!(block_string(&[3, b'B', b'2'], 5), "B2");
        assert_eq!(block_string(&[1], 3), "");
        assert_eq!(block_string(&[], 3), "");
    }

    #[test]
    fn test_block_string_non_utf8() {
        let s = block_string(&[2, 0xFF, b'A'], 5);
        assert!(s.ends_with('A'));
    }
}

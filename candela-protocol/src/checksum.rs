//! Frame checksum
//!
//! The device verifies a 16-bit modular sum over the length bytes and the
//! payload. The algorithm is protocol magic validated against captured
//! known-good packets, not derived from first principles.

/// Modular 16-bit sum of a byte sequence
pub fn compute(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(byte as u16))
}

/// Check a byte sequence against a claimed checksum
pub fn verify(bytes: &[u8], claimed: u16) -> bool {
    compute(bytes) == claimed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sum_is_zero() {
        assert_eq!(compute(&[]), 0);
    }

    #[test]
    fn test_sum_wraps_modulo_16_bits() {
        let bytes = [0xff; 300];
        assert_eq!(compute(&bytes), ((300 * 0xff) % 0x1_0000) as u16);
    }

    #[test]
    fn test_reference_packet_checksum() {
        // Length bytes + payload of the captured 4-color test image packet
        // sum to 0x2816 (the checksum carried by the capture).
        let mut bytes = std::vec![0x5a_u8, 0x00];
        bytes.extend_from_slice(&[0x44, 0x00, 0x0a, 0x0a, 0x04]);
        bytes.extend_from_slice(&[0xaa, 0x53, 0x00, 0xf4, 0x01, 0x00, 0x04]);
        bytes.extend_from_slice(&[
            0x00, 0x00, 0x00, 0xff, 0x00, 0x00, 0xff, 0x55, 0x00, 0xff, 0xff, 0xff,
        ]);
        bytes.extend_from_slice(&[0xe4, 0x00, 0x00, 0x00]);
        for _ in 0..7 {
            bytes.extend_from_slice(&[0x00, 0x00, 0x55, 0x55]);
        }
        for _ in 0..8 {
            bytes.extend_from_slice(&[0xaa, 0xaa, 0xff, 0xff]);
        }
        assert_eq!(bytes.len(), 2 + 88);
        assert_eq!(compute(&bytes), 0x2816);
        assert!(verify(&bytes, 0x2816));
        assert!(!verify(&bytes, 0x2817));
    }

    #[test]
    fn test_any_single_bit_flip_changes_sum() {
        let bytes = [0x12, 0x34, 0x56, 0x78];
        let reference = compute(&bytes);
        for i in 0..bytes.len() {
            for bit in 0..8 {
                let mut corrupted = bytes;
                corrupted[i] ^= 1 << bit;
                assert_ne!(compute(&corrupted), reference);
            }
        }
    }
}

//! Checksum bit positions.
//!
//! Positions are the running sum of the nonzero digits of pi, with 4 added
//! per step for the 288-bit form, stopping at the chash length.

const PI: &[u8] = b"14159265358979323846264338327950288419716939937510";

/// Checksum positions inside a 160-bit chash.
pub const OFFSETS_160: [usize; 32] = calc_offsets(160);

/// Checksum positions inside a 288-bit chash.
pub const OFFSETS_288: [usize; 32] = calc_offsets(288);

const fn calc_offsets(chash_length: usize) -> [usize; 32] {
    let mut offsets = [0usize; 32];
    let mut count = 0;
    let mut offset = 0;
    let mut i = 0;
    while i < PI.len() {
        let digit = (PI[i] - b'0') as usize;
        i += 1;
        if digit == 0 {
            continue;
        }
        offset += digit;
        if chash_length == 288 {
            offset += 4;
        }
        if offset >= chash_length {
            break;
        }
        offsets[count] = offset;
        count += 1;
    }
    assert!(count == 32, "checksum needs exactly 32 positions");
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_160() {
        assert_eq!(
            OFFSETS_160,
            [
                1, 5, 6, 11, 20, 22, 28, 33, 36, 41, 49, 58, 65, 74, 77, 79, 82, 90, 94, 100, 102,
                108, 112, 115, 118, 126, 129, 131, 138, 147, 152, 154
            ]
        );
    }

    #[test]
    fn test_offsets_288() {
        assert_eq!(
            OFFSETS_288,
            [
                5, 13, 18, 27, 40, 46, 56, 65, 72, 81, 93, 106, 117, 130, 137, 143, 150, 162, 170,
                180, 186, 196, 204, 211, 218, 230, 237, 243, 254, 267, 276, 282
            ]
        );
    }

    #[test]
    fn test_offsets_strictly_increasing() {
        for table in [OFFSETS_160, OFFSETS_288] {
            assert!(table.windows(2).all(|w| w[0] < w[1]));
        }
    }
}

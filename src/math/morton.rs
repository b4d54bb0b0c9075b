//! Morton encoding (Z-order curve) for 2D spatial indexing

/// Spread bits of a 16-bit integer into every second bit of a 32-bit integer
fn spread_bits(x: u32) -> u32 {
    let mut x = x & 0xffff; // 16 bits max
    x = (x | (x << 8)) & 0x00ff00ff;
    x = (x | (x << 4)) & 0x0f0f0f0f;
    x = (x | (x << 2)) & 0x33333333;
    x = (x | (x << 1)) & 0x55555555;
    x
}

/// Compact every second bit of a 32-bit integer into a 16-bit integer
fn compact_bits(x: u32) -> u32 {
    let mut x = x & 0x55555555;
    x = (x | (x >> 1)) & 0x33333333;
    x = (x | (x >> 2)) & 0x0f0f0f0f;
    x = (x | (x >> 4)) & 0x00ff00ff;
    x = (x | (x >> 8)) & 0x0000ffff;
    x
}

/// Encode 2D coordinates into a Morton code (Z-order curve)
/// Each coordinate can be up to 16 bits (0..65535).
/// Y occupies the even bit positions, X the odd ones.
pub fn encode_morton_2d(x: u32, y: u32) -> u32 {
    spread_bits(y) | (spread_bits(x) << 1)
}

/// Decode a Morton code back to 2D coordinates
pub fn decode_morton_2d(code: u32) -> (u32, u32) {
    (compact_bits(code >> 1), compact_bits(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for x in [0, 1, 10, 100, 500, 1000, 65535] {
            for y in [0, 1, 10, 100, 500, 1000, 65535] {
                let code = encode_morton_2d(x, y);
                let (dx, dy) = decode_morton_2d(code);
                assert_eq!((x, y), (dx, dy), "Failed for ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_ordering() {
        // Morton codes should interleave bits, y in the even positions
        assert_eq!(encode_morton_2d(0, 0), 0);
        assert_eq!(encode_morton_2d(0, 1), 1);
        assert_eq!(encode_morton_2d(1, 0), 2);
        assert_eq!(encode_morton_2d(1, 1), 3);
        assert_eq!(encode_morton_2d(0, 2), 4);
        assert_eq!(encode_morton_2d(2, 0), 8);
    }
}

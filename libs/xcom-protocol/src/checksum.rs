//! Xcom 2-byte rolling checksum
//!
//! Two running sums seeded with `A = 0xFF`, `B = 0x00`. For every byte `d`:
//! `A = (A + d) mod 256`, then `B = (B + A) mod 256`. The checksum is `[A, B]`.

/// Compute the checksum of `data`
pub fn checksum(data: &[u8]) -> [u8; 2] {
    let (a, b) = data.iter().fold((0xFFu8, 0x00u8), |(a, b), &d| {
        let a = a.wrapping_add(d);
        (a, b.wrapping_add(a))
    });
    [a, b]
}

/// Whether `expected` (the two bytes read from the wire) matches `data`
pub fn verify(data: &[u8], expected: &[u8]) -> bool {
    expected.len() == 2 && checksum(data) == expected
}

//! Hex formatting for packet logs

use std::fmt::Write;

/// Space separated uppercase hex, as used in raw packet debug logs
/// Example: [0xAA, 0x00, 0x01] -> "AA 00 01"
pub fn format_hex_pretty(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_format_hex_pretty() {
        assert_eq!(format_hex_pretty(&[0xAA, 0x00, 0x01]), "AA 00 01");
        assert_eq!(format_hex_pretty(&[0x0D]), "0D");
        assert_eq!(format_hex_pretty(&[]), "");
    }
}

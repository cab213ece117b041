use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Nicely format the given bytes as a hex block, one line per 16 bytes. The
/// listed addresses start from `start` and wrap around the 16-bit address
/// space, as the guest would see them.
///
/// The ASCII column ignores the high bit, so text stored with the high bit
/// set (the usual convention for screen and disk text) is still readable.
pub fn pretty_print_hex_block(buf: &[u8], start: u16) -> String {
    // Each line is a 5-character address, 2 spaces, 16 bytes of 3 characters,
    // 1 extra space in the middle, and 18 characters of ASCII with bars.
    let mut str = String::with_capacity((buf.len() / BYTES_PER_LINE + 1) * 74);
    for (line, chunk) in buf.chunks(BYTES_PER_LINE).enumerate() {
        if line != 0 {
            str.push('\n');
        }
        let address = start.wrapping_add((line * BYTES_PER_LINE) as u16);
        write!(str, "{:04X}: ", address).unwrap();
        for i in 0..BYTES_PER_LINE {
            if i == BYTES_PER_LINE / 2 {
                str.push(' ');
            }
            match chunk.get(i) {
                Some(byte) => write!(str, " {:02X}", byte).unwrap(),
                None => str.push_str("   "),
            }
        }
        str.push_str("  |");
        str.extend(chunk.iter().map(|&b| printable(b)));
        str.push('|');
    }

    str
}

fn printable(chr: u8) -> char {
    match chr & 0x7F {
        c @ 32..=126 => c.into(),
        _ => '.',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lines() {
        let buf: Vec<u8> = (0x40..0x60).collect();
        let printed = pretty_print_hex_block(&buf, 0x0800);
        let lines: Vec<&str> = printed.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0],
            "0800:  40 41 42 43 44 45 46 47  48 49 4A 4B 4C 4D 4E 4F  |@ABCDEFGHIJKLMNO|");
        assert!(lines[1].starts_with("0810:  50 51"));
    }

    #[test]
    fn test_partial_line_and_high_ascii() {
        let printed = pretty_print_hex_block(&[0xC1, 0x00, 0xC2], 0xFFFE);
        assert_eq!(printed,
            "FFFE:  C1 00 C2                                          |A.B|");
    }
}

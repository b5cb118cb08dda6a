//! Byte extraction helpers shared by the frame parsers
//!
//! All readers are bounds-checked and return `None` past the end of the
//! buffer, so parsers can bail out with `?` instead of indexing blindly.

/// Unsigned byte at `index`
#[inline]
pub fn read_u8(buffer: &[u8], index: usize) -> Option<u8> {
    buffer.get(index).copied()
}

/// Big-endian unsigned short starting at `index`
#[inline]
pub fn read_u16_be(buffer: &[u8], index: usize) -> Option<u16> {
    let bytes = buffer.get(index..index.checked_add(2)?)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Little-endian unsigned short starting at `index`
#[inline]
pub fn read_u16_le(buffer: &[u8], index: usize) -> Option<u16> {
    let bytes = buffer.get(index..index.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Little-endian unsigned int starting at `index`
#[inline]
pub fn read_u32_le(buffer: &[u8], index: usize) -> Option<u32> {
    let bytes = buffer.get(index..index.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// CRC8 with the reflected polynomial 0x8C (Dallas/Maxim), initial value 0.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &byte| crc8_push(crc, byte))
}

fn crc8_push(crc: u8, byte: u8) -> u8 {
    let mut crc = crc ^ byte;
    for _ in 0..8 {
        crc = if crc & 0x01 != 0 {
            (crc >> 1) ^ 0x8C
        } else {
            crc >> 1
        };
    }
    crc
}

/// Parse a whitespace-tolerant hex dump (`"FE 08 F7"`, `"fe08f7"`) into bytes.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, crate::error::ComputeError> {
    let digits: Vec<char> = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != ':')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(crate::error::ComputeError::InvalidHex(format!(
            "odd number of hex digits ({})",
            digits.len()
        )));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let text: String = pair.iter().collect();
            u8::from_str_radix(&text, 16)
                .map_err(|e| crate::error::ComputeError::InvalidHex(format!("{text}: {e}")))
        })
        .collect()
}

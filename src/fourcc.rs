/// A 4-byte tag stored as a little-endian `u32`: the first byte on disk is the lowest byte.
pub type FourCc = u32;

/// Build a fourcc from its on-disk bytes, e.g. `fourcc(b"MODL")`.
pub const fn fourcc(bytes: &[u8; 4]) -> FourCc {
    u32::from_le_bytes(*bytes)
}

/// Parse a fourcc from a command-line style string. Accepts four ASCII
/// characters (`MODL`) or a hex literal (`0x4C444F4D`).
pub fn parse_fourcc(text: &str) -> Option<FourCc> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    let bytes: [u8; 4] = text.as_bytes().try_into().ok()?;
    Some(fourcc(&bytes))
}

/// Render a fourcc for display. Printable tags come out as text,
/// anything else as hex.
pub fn fourcc_str(value: FourCc) -> String {
    let bytes = value.to_le_bytes();
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
        bytes.iter().map(|&b| b as char).collect()
    } else {
        format!("{:#010X}", value)
    }
}

// Content types, in alphabetic order
pub const AMAT: FourCc = fourcc(b"AMAT");
pub const MODL: FourCc = fourcc(b"MODL");

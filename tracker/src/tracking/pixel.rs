//! Static tracking pixel payload.

/// A 1x1 transparent GIF, served for every open-pixel hit regardless of
/// recording outcome so tracking failures never surface to the recipient.
pub const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, // "GIF89a"
    0x01, 0x00, 0x01, 0x00, // 1x1 canvas
    0x80, 0x00, 0x00, // global color table, 2 entries
    0x00, 0x00, 0x00, // color 0: black
    0xFF, 0xFF, 0xFF, // color 1: white
    0x21, 0xF9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, // color 0 is transparent
    0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // image descriptor
    0x02, 0x02, 0x44, 0x01, 0x00, // pixel data
    0x3B, // trailer
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_is_a_gif() {
        assert_eq!(&PIXEL_GIF[..6], b"GIF89a");
        assert_eq!(PIXEL_GIF[PIXEL_GIF.len() - 1], 0x3B);
        assert_eq!(PIXEL_GIF.len(), 43);
    }
}

//! VGM 1.50 header: fixed 256-byte prefix, only the fields this
//! converter ever populates (OPL2 is the only chip it ever targets).

/// This crate only ever emits VGM 1.50.
pub const VGM_VERSION: u32 = 0x150;

/// Fixed header size (§6: "256-byte prefix is standard" for this format).
pub const VGM_HEADER_SIZE: usize = 256;

/// VGM header byte offsets used by this converter.
pub mod offset {
    /// "Vgm " identifier.
    pub const IDENT: usize = 0x00;
    /// End of file offset, relative to 0x04.
    pub const EOF_OFFSET: usize = 0x04;
    /// Version number.
    pub const VERSION: usize = 0x08;
    /// GD3 offset, relative to 0x14; always 0 (never written).
    pub const GD3_OFFSET: usize = 0x14;
    /// Total samples.
    pub const TOTAL_SAMPLES: usize = 0x18;
    /// Loop offset, relative to 0x1C; always 0 (no looping).
    pub const LOOP_OFFSET: usize = 0x1C;
    /// Recording rate.
    pub const RATE: usize = 0x24;
    /// VGM data offset, relative to 0x34.
    pub const DATA_OFFSET: usize = 0x34;
    /// YM3812 (OPL2) clock.
    pub const YM3812_CLOCK: usize = 0x50;
}

/// The fixed OPL2 clock this converter always stamps into the header.
pub const OPL2_CLOCK: u32 = 3_579_545;
/// The recording rate this converter always stamps into the header.
pub const RECORDING_RATE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct VgmHeader {
    data: [u8; VGM_HEADER_SIZE],
}

impl VgmHeader {
    pub fn new() -> Self {
        let mut header = Self {
            data: [0; VGM_HEADER_SIZE],
        };
        header.data[0..4].copy_from_slice(b"Vgm ");
        header.write_u32(offset::VERSION, VGM_VERSION);
        header.write_u32(offset::RATE, RECORDING_RATE);
        header.write_u32(offset::YM3812_CLOCK, OPL2_CLOCK);
        header.write_u32(offset::DATA_OFFSET, (VGM_HEADER_SIZE - offset::DATA_OFFSET) as u32);
        header
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn as_bytes(&self) -> &[u8; VGM_HEADER_SIZE] {
        &self.data
    }
}

impl Default for VgmHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_matches_fixed_offsets() {
        let header = VgmHeader::new();
        let b = header.as_bytes();
        assert_eq!(&b[0..4], b"Vgm ");
        assert_eq!(u32::from_le_bytes(b[0x08..0x0C].try_into().unwrap()), 0x150);
        assert_eq!(u32::from_le_bytes(b[0x24..0x28].try_into().unwrap()), 1000);
        assert_eq!(u32::from_le_bytes(b[0x34..0x38].try_into().unwrap()), 0xCC);
        assert_eq!(
            u32::from_le_bytes(b[0x50..0x54].try_into().unwrap()),
            3_579_545
        );
    }
}

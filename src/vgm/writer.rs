//! VGM recorder (Component C): captures OPL register writes and wait
//! events into an ordered in-memory log, then serializes a complete
//! VGM 1.50 byte buffer. Unlike a file-backed writer, `finish` hands
//! back owned bytes — the core API returns `vgm_bytes`, it does not
//! write files itself (that is the CLI's job).

use super::delay;
use super::header::{offset, VgmHeader};

pub struct VgmWriter {
    header: VgmHeader,
    data: Vec<u8>,
    total_samples: u64,
}

impl VgmWriter {
    pub fn new() -> Self {
        Self {
            header: VgmHeader::new(),
            data: Vec::new(),
            total_samples: 0,
        }
    }

    /// Record a single OPL2 register write as a `0x5A reg val` record.
    pub fn write_opl(&mut self, reg: u8, val: u8) {
        self.data.push(0x5A);
        self.data.push(reg);
        self.data.push(val);
    }

    /// Record a wait of `samples` samples, split into `0x61` records.
    pub fn wait(&mut self, samples: u32) {
        self.data.extend(delay::generate_delay(samples));
        self.total_samples += samples as u64;
    }

    /// Append the end marker and produce the final VGM byte buffer.
    pub fn finish(mut self) -> Vec<u8> {
        self.data.push(delay::cmd::END);

        self.header
            .write_u32(offset::TOTAL_SAMPLES, self.total_samples as u32);
        self.header.write_u32(offset::GD3_OFFSET, 0);
        self.header.write_u32(offset::LOOP_OFFSET, 0);

        let total_bytes = super::header::VGM_HEADER_SIZE + self.data.len();
        self.header
            .write_u32(offset::EOF_OFFSET, (total_bytes - 4) as u32);

        let mut out = Vec::with_capacity(total_bytes);
        out.extend_from_slice(self.header.as_bytes());
        out.extend_from_slice(&self.data);
        out
    }
}

impl Default for VgmWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_offset_matches_total_length() {
        let mut w = VgmWriter::new();
        w.write_opl(0x01, 0x20);
        w.wait(441);
        let bytes = w.finish();
        let eof = u32::from_le_bytes(bytes[0x04..0x08].try_into().unwrap());
        assert_eq!(eof as usize, bytes.len() - 4);
    }

    #[test]
    fn total_samples_sums_all_waits_regardless_of_split() {
        let mut w = VgmWriter::new();
        w.wait(70000);
        w.wait(1);
        let bytes = w.finish();
        let total = u32::from_le_bytes(bytes[0x18..0x1C].try_into().unwrap());
        assert_eq!(total, 70001);
    }

    #[test]
    fn ends_with_end_marker() {
        let w = VgmWriter::new();
        let bytes = w.finish();
        assert_eq!(*bytes.last().unwrap(), 0x66);
    }
}

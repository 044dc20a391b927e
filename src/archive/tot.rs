//! TOT/EXT resource bundle parsing (part of Component E): the script
//! engine's per-scene resource table, with embedded songs reachable
//! either inline in the TOT/EXT file or indexed into a shared IM/EX
//! bank.

use std::io::Cursor;

use crate::error::{Error, Result};
use crate::stream::{ReadExt, SeekExt};

use super::gamedir::{unpack, GameDir};

const TOT_HEADER_SIZE: usize = 128;
const TOT_RES_TABLE_SIZE: usize = 2 + 1;
const TOT_RES_ITEM_SIZE: usize = 4 + 2 + 2 + 2;
const EXT_RES_TABLE_SIZE: usize = 2 + 1;
const EXT_RES_ITEM_SIZE: usize = 4 + 2 + 2 + 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TotResourceType {
    Im,
    Tot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExtResourceType {
    Ex,
    Ext,
}

struct TotResourceItem {
    offset: i32,
    size: u16,
    kind: TotResourceType,
    index: i32,
}

struct ExtResourceItem {
    offset: i32,
    size: u16,
    width: u16,
    height: u16,
    kind: ExtResourceType,
    packed: bool,
}

struct Properties {
    resources_offset: u32,
    im_file_number: u8,
    ex_file_number: u8,
}

/// One loaded TOT script bundle: the `.tot` file plus whichever of its
/// optional `.ext`/`commun.imN`/`commun.exN` companions exist.
pub struct TotFile {
    name: String,
    tot_data: Vec<u8>,
    ext_data: Option<Vec<u8>>,
    im_data: Option<Vec<u8>>,
    ex_data: Option<Vec<u8>>,
    tot_table: Option<Vec<TotResourceItem>>,
    tot_data_offset: u32,
    ext_table: Option<Vec<ExtResourceItem>>,
}

impl TotFile {
    pub fn load(game_dir: &GameDir, name: &str) -> Result<Self> {
        let base = name.rsplit_once('.').map(|(b, _)| b).unwrap_or(name);

        let tot_data = game_dir.get_file(&format!("{base}.tot"))?;
        let props = Self::parse_properties(&tot_data)?;

        let ext_data = game_dir.get_file(&format!("{base}.ext")).ok();

        let tot_table = Self::parse_tot_resource_table(&tot_data, &props);
        let ext_table = ext_data
            .as_deref()
            .and_then(|ext| Self::parse_ext_resource_table(ext).ok());

        let im_data = if tot_table.is_some() {
            let num = if props.im_file_number == 0 {
                b'1'
            } else {
                props.im_file_number + b'0'
            };
            game_dir.get_file(&format!("commun.im{}", num as char)).ok()
        } else {
            None
        };

        let ex_data = if ext_table.is_some() {
            let num = props.ex_file_number + b'0';
            game_dir.get_file(&format!("commun.ex{}", num as char)).ok()
        } else {
            None
        };

        let tot_data_offset = props.resources_offset
            + TOT_RES_TABLE_SIZE as u32
            + tot_table.as_ref().map_or(0, |t| t.len() as u32) * TOT_RES_ITEM_SIZE as u32;

        Ok(TotFile {
            name: base.to_string(),
            tot_data,
            ext_data,
            im_data,
            ex_data,
            tot_table,
            tot_data_offset,
            ext_table,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn parse_properties(data: &[u8]) -> Result<Properties> {
        if data.len() < TOT_HEADER_SIZE {
            return Err(Error::format("tot", "header shorter than 128 bytes"));
        }

        if data[40] != b'.' {
            return Err(Error::format("tot", "invalid version marker"));
        }

        let resources_offset = u32::from_le_bytes(data[52..56].try_into().unwrap());
        let im_file_number = data[59];
        let ex_file_number = data[60];

        Ok(Properties {
            resources_offset,
            im_file_number,
            ex_file_number,
        })
    }

    fn parse_tot_resource_table(data: &[u8], props: &Properties) -> Option<Vec<TotResourceItem>> {
        if props.resources_offset == 0 || props.resources_offset == 0xFFFFFFFF {
            return None;
        }

        let start = props.resources_offset as usize;
        let mut cursor = Cursor::new(data);
        cursor.seek_to_ctx(start as u64, "tot-resources").ok()?;
        let count = cursor.read_i16le_ctx("tot-resources").ok()?;
        if count < 0 {
            return None;
        }
        let count = count as usize;

        let table_size = TOT_RES_TABLE_SIZE + count * TOT_RES_ITEM_SIZE;
        if start + table_size > data.len() {
            // Declared table would run past the end of the file; treat
            // as absent rather than fail the whole conversion.
            return None;
        }

        let _unknown = cursor.read_u8_ctx("tot-resources").ok()?;

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let offset = cursor.read_i32le_ctx("tot-resources").ok()?;
            let size = cursor.read_u16le_ctx("tot-resources").ok()?;
            let _width = cursor.read_i16le_ctx("tot-resources").ok()?;
            let _height = cursor.read_i16le_ctx("tot-resources").ok()?;

            let (kind, index) = if offset < 0 {
                (TotResourceType::Im, -offset - 1)
            } else {
                (TotResourceType::Tot, 0)
            };

            items.push(TotResourceItem { offset, size, kind, index });
        }

        Some(items)
    }

    fn parse_ext_resource_table(data: &[u8]) -> Result<Vec<ExtResourceItem>> {
        let mut cursor = Cursor::new(data);
        let count = cursor.read_i16le_ctx("ext-resources")?;
        let _unknown = cursor.read_u8_ctx("ext-resources")?;

        if count <= 0 {
            return Ok(Vec::new());
        }
        let count = count as usize;

        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let mut offset = cursor.read_i32le_ctx("ext-resources")? ;
            let size = cursor.read_u16le_ctx("ext-resources")?;
            let mut width = cursor.read_u16le_ctx("ext-resources")?;
            let height = cursor.read_u16le_ctx("ext-resources")?;

            let kind = if offset < 0 {
                offset = -offset - 1;
                ExtResourceType::Ex
            } else {
                offset += (EXT_RES_TABLE_SIZE + EXT_RES_ITEM_SIZE * count) as i32;
                ExtResourceType::Ext
            };

            let packed = (width & 0x8000) != 0;
            width &= 0x7FFF;

            items.push(ExtResourceItem {
                offset,
                size,
                width,
                height,
                kind,
                packed,
            });
        }

        Ok(items)
    }

    pub fn tot_resource_count(&self) -> usize {
        self.tot_table.as_ref().map_or(0, |t| t.len())
    }

    pub fn ext_resource_count(&self) -> usize {
        self.ext_table.as_ref().map_or(0, |t| t.len())
    }

    /// Fetch TOT resource `id` (raw bytes; the ADL interpreter decides
    /// whether they parse as a song).
    pub fn tot_resource(&self, id: usize) -> Result<Vec<u8>> {
        let table = self
            .tot_table
            .as_ref()
            .ok_or_else(|| Error::format("tot", "no TOT resource table"))?;
        let item = table
            .get(id)
            .ok_or_else(|| Error::format("tot", format!("no such TOT resource {id}")))?;

        match item.kind {
            TotResourceType::Tot => self.tot_data_item(item),
            TotResourceType::Im => self.im_data_item(item),
        }
    }

    fn tot_data_item(&self, item: &TotResourceItem) -> Result<Vec<u8>> {
        if item.size == 0 {
            return Err(Error::format("tot", "TOT item has size 0"));
        }
        let offset = self.tot_data_offset as usize + item.offset as usize;
        let end = offset + item.size as usize;
        self.tot_data
            .get(offset..end)
            .map(|s| s.to_vec())
            .ok_or_else(|| Error::format("tot", "TOT item out of range"))
    }

    fn im_data_item(&self, item: &TotResourceItem) -> Result<Vec<u8>> {
        if item.size == 0 {
            return Err(Error::format("tot", "TOT item has size 0"));
        }
        let im = self
            .im_data
            .as_ref()
            .ok_or_else(|| Error::format("tot", "no IM file"))?;

        let index_offset = item.index as usize * 4;
        let offset_bytes = im
            .get(index_offset..index_offset + 4)
            .ok_or_else(|| Error::format("tot", "IM index out of range"))?;
        let offset = u32::from_le_bytes(offset_bytes.try_into().unwrap()) as usize;

        let end = offset + item.size as usize;
        im.get(offset..end)
            .map(|s| s.to_vec())
            .ok_or_else(|| Error::format("tot", "IM item out of range"))
    }

    /// Fetch EXT resource `id`, expanding the high-bit size extension
    /// and unpacking if the `packed` flag is set.
    pub fn ext_resource(&self, id: usize) -> Result<Vec<u8>> {
        let table = self
            .ext_table
            .as_ref()
            .ok_or_else(|| Error::format("tot", "no EXT resource table"))?;
        let item = table
            .get(id)
            .ok_or_else(|| Error::format("tot", format!("no such EXT resource {id}")))?;

        let mut size = item.size as u32;
        if item.width & 0x4000 != 0 {
            size += 1 << 16;
        }
        if item.width & 0x2000 != 0 {
            size += 2 << 16;
        }
        if item.width & 0x1000 != 0 {
            size += 4 << 16;
        }
        if item.height == 0 {
            size += (item.width as u32) << 16;
        }

        let data = match item.kind {
            ExtResourceType::Ext => self.read_companion(self.ext_data.as_deref(), item, size, "ext"),
            ExtResourceType::Ex => self.read_companion(self.ex_data.as_deref(), item, size, "ex"),
        }?;

        if !item.packed {
            return Ok(data);
        }

        unpack(&data, 1)
    }

    fn read_companion(
        &self,
        file: Option<&[u8]>,
        item: &ExtResourceItem,
        size: u32,
        label: &str,
    ) -> Result<Vec<u8>> {
        let file = file.ok_or_else(|| Error::format("tot", format!("no {label} file")))?;
        let offset = item.offset as usize;
        if offset > file.len() {
            return Err(Error::format("tot", format!("{label} offset out of range")));
        }
        let available = (file.len() - offset) as u32;
        let effective = size.min(available) as usize;
        let read_len = if item.packed { effective + 2 } else { effective };
        let end = (offset + read_len).min(file.len());
        Ok(file[offset..end].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with_resources_at(offset: u32) -> Vec<u8> {
        let mut data = vec![0u8; TOT_HEADER_SIZE];
        data[40] = b'.';
        data[52..56].copy_from_slice(&offset.to_le_bytes());
        data[59] = 0;
        data[60] = 0;
        data
    }

    #[test]
    fn properties_reject_a_short_header() {
        let err = TotFile::parse_properties(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn properties_reject_a_missing_version_marker() {
        let data = vec![0u8; TOT_HEADER_SIZE];
        let err = TotFile::parse_properties(&data).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn tot_resource_table_reads_one_inline_item() {
        let mut data = header_with_resources_at(TOT_HEADER_SIZE as u32);
        // count = 1, unknown byte, then one item: offset 0 (TOT-inline), size 5.
        data.extend_from_slice(&1i16.to_le_bytes());
        data.push(0);
        data.extend_from_slice(&0i32.to_le_bytes());
        data.extend_from_slice(&5u16.to_le_bytes());
        data.extend_from_slice(&0i16.to_le_bytes());
        data.extend_from_slice(&0i16.to_le_bytes());
        data.extend_from_slice(b"HELLO");

        let props = TotFile::parse_properties(&data).unwrap();
        let table = TotFile::parse_tot_resource_table(&data, &props).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].kind, TotResourceType::Tot);
        assert_eq!(table[0].size, 5);
    }

    #[test]
    fn tot_resource_table_is_absent_when_offset_is_sentinel() {
        let data = header_with_resources_at(0xFFFFFFFF);
        let props = TotFile::parse_properties(&data).unwrap();
        assert!(TotFile::parse_tot_resource_table(&data, &props).is_none());
    }

    #[test]
    fn ext_resource_table_decodes_packed_flag_and_negative_offset_as_ex() {
        let mut data = Vec::new();
        data.extend_from_slice(&1i16.to_le_bytes()); // count
        data.push(0); // unknown
        // offset -1 -> EX resource index 0; width's high bit marks packed.
        data.extend_from_slice(&(-1i32).to_le_bytes());
        data.extend_from_slice(&42u16.to_le_bytes()); // size
        data.extend_from_slice(&(0x8010u16).to_le_bytes()); // width, packed
        data.extend_from_slice(&7u16.to_le_bytes()); // height

        let table = TotFile::parse_ext_resource_table(&data).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].kind, ExtResourceType::Ex);
        assert_eq!(table[0].offset, 0);
        assert!(table[0].packed);
        assert_eq!(table[0].width, 0x10);
    }
}

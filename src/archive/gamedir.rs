//! Game directory crawler (part of Component E): scans one directory,
//! opens STK/ITK archive indexes, and resolves a file by name either
//! directly on disk or inside an archive, decompressing on demand.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::stream::{ReadExt, SeekExt};

use super::lzss;

fn lowercase(s: &str) -> String {
    s.to_ascii_lowercase()
}

fn has_extension(name: &str, ext: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, e)) => e.eq_ignore_ascii_case(ext),
        None => false,
    }
}

struct ArchiveEntry {
    size: u32,
    offset: u32,
    compression: u8,
    archive: usize,
}

struct Archive {
    path: PathBuf,
    files: HashMap<String, ArchiveEntry>,
}

/// A scanned game directory: on-disk files plus every STK/ITK archive's
/// index, with the ADL/MDY/TOT classification lists the crawler needs.
pub struct GameDir {
    path: PathBuf,
    files: Vec<String>,
    archives: Vec<Archive>,
    adl: Vec<String>,
    mdy: Vec<String>,
    tot: Vec<String>,
}

impl GameDir {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut dir = GameDir {
            path,
            files: Vec::new(),
            archives: Vec::new(),
            adl: Vec::new(),
            mdy: Vec::new(),
            tot: Vec::new(),
        };
        dir.scan_dir()?;
        dir.open_archives();
        Ok(dir)
    }

    fn classify(name: &str, adl: &mut Vec<String>, mdy: &mut Vec<String>, tot: &mut Vec<String>) {
        if has_extension(name, "adl") || has_extension(name, "mid") {
            adl.push(name.to_string());
        } else if has_extension(name, "mdy") || has_extension(name, "mus") {
            mdy.push(name.to_string());
        } else if has_extension(name, "tot") {
            tot.push(name.to_string());
        }
    }

    fn scan_dir(&mut self) -> Result<()> {
        let context = self.path.display().to_string();
        let entries = fs::read_dir(&self.path)
            .map_err(|e| Error::Open(context.clone(), e))?;

        let mut stk = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::Read(context.clone(), e))?;
            let name = entry.file_name().to_string_lossy().into_owned();

            if has_extension(&name, "stk") || has_extension(&name, "itk") {
                stk.push(name.clone());
            }
            Self::classify(&name, &mut self.adl, &mut self.mdy, &mut self.tot);

            self.files.push(name);
        }

        for name in stk {
            let archive_path = self.path.join(&name);
            match self.open_archive_index(&archive_path) {
                Ok(_) => {}
                Err(e) => eprintln!("WARNING: opening archive {}: {e}", archive_path.display()),
            }
        }

        Ok(())
    }

    fn open_archives(&mut self) {
        // Archive indexes are read during scan_dir; nothing further to do
        // here. Kept as a separate step to mirror the reference's
        // openDir()/openArchives() split.
    }

    fn open_archive_index(&mut self, path: &Path) -> Result<()> {
        let context = path.display().to_string();
        let mut file = fs::File::open(path).map_err(|e| Error::Open(context.clone(), e))?;

        let file_count = file.read_u16le_ctx(&context)?;
        let archive_index = self.archives.len();
        let mut files = HashMap::new();

        for _ in 0..file_count {
            let mut name_buf = [0u8; 13];
            file.read_exact(&mut name_buf)
                .map_err(|e| Error::Read(context.clone(), e))?;
            let nul = name_buf.iter().position(|&b| b == 0).unwrap_or(13);
            let raw_name = String::from_utf8_lossy(&name_buf[..nul]).into_owned();

            let size = file.read_u32le_ctx(&context)?;
            let offset = file.read_u32le_ctx(&context)?;
            let packed = file.read_u8_ctx(&context)?;

            let mut name = lowercase(&raw_name);
            let mut compression = if packed != 0 { 1 } else { 0 };

            // Geisha uses 0ot files: compressed TOT files without the
            // packed byte set.
            if has_extension(&name, "0ot") {
                let len = name.len();
                name.replace_range(len - 3..len - 2, "t");
                compression = 2;
            }

            Self::classify(&name, &mut self.adl, &mut self.mdy, &mut self.tot);

            files.insert(
                name,
                ArchiveEntry {
                    size,
                    offset,
                    compression,
                    archive: archive_index,
                },
            );
        }

        self.archives.push(Archive {
            path: path.to_path_buf(),
            files,
        });

        Ok(())
    }

    pub fn adl_files(&self) -> &[String] {
        &self.adl
    }

    pub fn mdy_files(&self) -> &[String] {
        &self.mdy
    }

    pub fn tot_files(&self) -> &[String] {
        &self.tot
    }

    /// Resolve `name` to owned, already-decompressed bytes: direct files
    /// on disk first (case-insensitive), then archive members.
    pub fn get_file(&self, name: &str) -> Result<Vec<u8>> {
        if let Some(data) = self.open_direct_file(name)? {
            return Ok(data);
        }

        self.open_archive_file(name)
    }

    fn open_direct_file(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let found = self.files.iter().find(|f| f.eq_ignore_ascii_case(name));
        let Some(found) = found else {
            return Ok(None);
        };

        let path = self.path.join(found);
        let context = path.display().to_string();
        let data = fs::read(&path).map_err(|e| Error::Open(context, e))?;
        Ok(Some(data))
    }

    fn open_archive_file(&self, name: &str) -> Result<Vec<u8>> {
        let key = lowercase(name);
        for archive in &self.archives {
            if let Some(entry) = archive.files.get(&key) {
                return Self::read_archive_entry(archive, entry);
            }
        }
        Err(Error::format("gamedir", format!("file not found: {name}")))
    }

    fn read_archive_entry(archive: &Archive, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        let context = archive.path.display().to_string();
        let mut file = fs::File::open(&archive.path).map_err(|e| Error::Open(context.clone(), e))?;
        file.seek_to_ctx(entry.offset as u64, &context)?;

        let mut raw = vec![0u8; entry.size as usize];
        file.read_exact(&mut raw)
            .map_err(|e| Error::Read(context.clone(), e))?;

        if entry.compression == 0 {
            return Ok(raw);
        }

        unpack(&raw, entry.compression)
    }
}

/// Decompress a payload whose compression scheme is `1` (single LZSS
/// chunk, size-prefixed) or `2` (chain of size-prefixed chunks).
pub fn unpack(data: &[u8], compression: u8) -> Result<Vec<u8>> {
    match compression {
        1 => unpack_single(data),
        2 => unpack_chunks(data),
        other => Err(Error::format(
            "lzss",
            format!("invalid compression scheme {other}"),
        )),
    }
}

fn unpack_single(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 4 {
        return Err(Error::format("lzss", "payload too short for size prefix"));
    }
    let size = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    lzss::decompress(&data[4..], size)
}

fn unpack_chunks(data: &[u8]) -> Result<Vec<u8>> {
    let total_size = size_of_chunks(data)?;
    let mut out = Vec::with_capacity(total_size);

    let mut cursor = std::io::Cursor::new(data);
    let mut chunk_size: u16 = 0;
    loop {
        let pos = cursor.position();
        chunk_size = cursor.read_u16le_ctx("lzss-chunks")?;
        let real_size = cursor.read_u16le_ctx("lzss-chunks")? as usize;

        if chunk_size < 4 {
            return Err(Error::format("lzss", format!("invalid chunk size {chunk_size}")));
        }
        if out.len() + real_size > total_size {
            return Err(Error::format("lzss", "chunk overruns declared total size"));
        }

        cursor.seek(SeekFrom::Current(2)).ok();
        let chunk_start = cursor.position() as usize;
        let piece = lzss::decompress(&data[chunk_start..], real_size)?;
        out.extend_from_slice(&piece);

        if chunk_size == 0xFFFF {
            break;
        }
        cursor
            .seek(SeekFrom::Start(pos + chunk_size as u64 + 2))
            .map_err(|e| Error::Seek("lzss-chunks".to_string(), e))?;
    }

    if out.len() != total_size {
        return Err(Error::format("lzss", "decompressed size mismatch"));
    }
    Ok(out)
}

fn size_of_chunks(data: &[u8]) -> Result<usize> {
    let mut cursor = std::io::Cursor::new(data);
    let mut size = 0usize;
    let mut chunk_size: u16 = 2;

    while chunk_size != 0xFFFF {
        cursor
            .seek(SeekFrom::Current(chunk_size as i64 - 2))
            .map_err(|e| Error::Seek("lzss-chunks".to_string(), e))?;

        chunk_size = cursor.read_u16le_ctx("lzss-chunks")?;
        let real_size = cursor.read_u16le_ctx("lzss-chunks")?;

        if chunk_size < 4 {
            return Err(Error::format("lzss", format!("invalid chunk size {chunk_size}")));
        }
        size += real_size as usize;
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn write_archive(dir: &Path, name: &str, members: &[(&str, &[u8], u8)]) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(&(members.len() as u16).to_le_bytes()).unwrap();

        let mut offset = 2 + members.len() as u32 * (13 + 4 + 4 + 1);
        let mut headers = Vec::new();
        for (member_name, data, packed) in members {
            let mut name_buf = [0u8; 13];
            name_buf[..member_name.len()].copy_from_slice(member_name.as_bytes());
            headers.push((name_buf, data.len() as u32, offset, *packed));
            offset += data.len() as u32;
        }
        for (name_buf, size, off, packed) in &headers {
            f.write_all(name_buf).unwrap();
            f.write_all(&size.to_le_bytes()).unwrap();
            f.write_all(&off.to_le_bytes()).unwrap();
            f.write_all(&[*packed]).unwrap();
        }
        for (_, data, _) in members {
            f.write_all(data).unwrap();
        }
        path
    }

    #[test]
    fn archive_lookup_is_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        write_archive(
            tmp.path(),
            "game.stk",
            &[("INTRO.ADL", b"hello-adl-bytes", 0)],
        );

        let dir = GameDir::open(tmp.path()).unwrap();
        let data = dir.get_file("intro.adl").unwrap();
        assert_eq!(data, b"hello-adl-bytes");

        let data2 = dir.get_file("INTRO.ADL").unwrap();
        assert_eq!(data2, b"hello-adl-bytes");
    }

    #[test]
    fn direct_file_on_disk_is_found_before_archives() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("song.adl"), b"direct-bytes").unwrap();

        let dir = GameDir::open(tmp.path()).unwrap();
        assert!(dir.adl_files().iter().any(|f| f == "song.adl"));
        let data = dir.get_file("SONG.ADL").unwrap();
        assert_eq!(data, b"direct-bytes");
    }

    #[test]
    fn zero_ot_member_is_renamed_and_force_compressed() {
        let tmp = tempfile::tempdir().unwrap();
        // A single literal-run LZSS payload: command byte 0xFF, 3 bytes.
        write_archive(tmp.path(), "game.stk", &[("scene.0ot", &[0xFF, b'a', b'b', b'c'], 0)]);

        let dir = GameDir::open(tmp.path()).unwrap();
        assert!(dir.tot_files().iter().any(|f| f == "scene.tot"));
    }
}

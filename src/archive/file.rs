//! On-disk archive container format
//!
//! Archive files store every table of one segment as an LZ4-compressed block.
//!
//! Layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (64 bytes)                       │
//! │   magic: [u8; 4] = "DQMA"               │
//! │   version: u16                          │
//! │   table_count: u32                      │
//! │   reserved: [u8; 50]                    │
//! │   checksum: u32                         │
//! ├─────────────────────────────────────────┤
//! │ TABLES (variable)                       │
//! │   For each table:                       │
//! │     block_size: u32                     │
//! │     compressed_rows: [u8; block_size]   │
//! │     block_checksum: u32                 │
//! ├─────────────────────────────────────────┤
//! │ FOOTER                                  │
//! │   For each table:                       │
//! │     key_len: u16, key: [u8; key_len]    │
//! │     offset: u64, size: u32, rows: u64   │
//! │   footer_size: u32                      │
//! │   footer_checksum: u32                  │
//! └─────────────────────────────────────────┘
//! ```

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::table::Table;
use crate::archive::{Container, SegmentOpener};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Magic bytes for archive file identification
const ARCHIVE_MAGIC: [u8; 4] = *b"DQMA";

/// Current archive format version
const ARCHIVE_VERSION: u16 = 1;

/// Header size in bytes
const HEADER_SIZE: usize = 64;

/// Archive file header
#[derive(Debug, Clone)]
pub struct ArchiveHeader {
    pub magic: [u8; 4],
    pub version: u16,
    pub table_count: u32,
    pub checksum: u32,
}

impl ArchiveHeader {
    pub fn new(table_count: u32) -> Self {
        Self {
            magic: ARCHIVE_MAGIC,
            version: ARCHIVE_VERSION,
            table_count,
            checksum: 0,
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&self.magic);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..10].copy_from_slice(&self.table_count.to_le_bytes());
        // bytes 10-59 reserved

        let checksum = crc32fast::hash(&buf[0..60]);
        buf[60..64].copy_from_slice(&checksum.to_le_bytes());

        buf
    }

    /// Parse header from bytes
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> ArchiveResult<Self> {
        let stored_checksum = u32::from_le_bytes([buf[60], buf[61], buf[62], buf[63]]);
        let computed_checksum = crc32fast::hash(&buf[0..60]);

        if stored_checksum != computed_checksum {
            return Err(ArchiveError::Corruption(format!(
                "Header checksum mismatch: stored={}, computed={}",
                stored_checksum, computed_checksum
            )));
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[0..4]);

        if magic != ARCHIVE_MAGIC {
            return Err(ArchiveError::InvalidFormat(format!(
                "Invalid magic: {:?}",
                magic
            )));
        }

        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version > ARCHIVE_VERSION {
            return Err(ArchiveError::InvalidFormat(format!(
                "Unsupported version: {}",
                version
            )));
        }

        let table_count = u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]);

        Ok(Self {
            magic,
            version,
            table_count,
            checksum: stored_checksum,
        })
    }
}

/// Directory entry for one table block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMeta {
    pub key: String,
    /// Offset from start of file
    pub offset: u64,
    /// Size of compressed data
    pub size: u32,
    pub row_count: u64,
}

/// An archive file opened for reading
pub struct ArchiveFile {
    path: PathBuf,
    location: String,
    pub header: ArchiveHeader,
    pub tables: Vec<TableMeta>,
    reader: BufReader<File>,
}

impl ArchiveFile {
    /// Open an existing archive file and load its table directory
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut reader = BufReader::new(File::open(&path)?);

        let mut header_buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_buf)?;
        let header = ArchiveHeader::from_bytes(&header_buf)?;

        let tables = Self::read_footer(&mut reader, &header)?;

        Ok(Self {
            location: path.display().to_string(),
            path,
            header,
            tables,
            reader,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory entry for a table key
    pub fn meta(&self, key: &str) -> Option<&TableMeta> {
        self.tables.iter().find(|t| t.key == key)
    }

    fn read_footer(
        file: &mut BufReader<File>,
        header: &ArchiveHeader,
    ) -> ArchiveResult<Vec<TableMeta>> {
        if header.table_count == 0 {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::End(-8))?;

        let mut footer_size_buf = [0u8; 4];
        file.read_exact(&mut footer_size_buf)?;
        let footer_size = u32::from_le_bytes(footer_size_buf);

        let mut checksum_buf = [0u8; 4];
        file.read_exact(&mut checksum_buf)?;
        let stored_checksum = u32::from_le_bytes(checksum_buf);

        file.seek(SeekFrom::End(-(footer_size as i64) - 8))?;

        let mut footer_data = vec![0u8; footer_size as usize];
        file.read_exact(&mut footer_data)?;

        let computed_checksum = crc32fast::hash(&footer_data);
        if stored_checksum != computed_checksum {
            return Err(ArchiveError::Corruption("Footer checksum mismatch".into()));
        }

        let mut cursor = FooterCursor::new(&footer_data);
        let mut tables = Vec::with_capacity(header.table_count as usize);

        for _ in 0..header.table_count {
            let key_len = u16::from_le_bytes(cursor.take()?) as usize;
            let key = String::from_utf8(cursor.take_slice(key_len)?.to_vec())
                .map_err(|e| ArchiveError::Corruption(format!("Table key is not UTF-8: {}", e)))?;
            let offset = u64::from_le_bytes(cursor.take()?);
            let size = u32::from_le_bytes(cursor.take()?);
            let row_count = u64::from_le_bytes(cursor.take()?);

            tables.push(TableMeta {
                key,
                offset,
                size,
                row_count,
            });
        }

        Ok(tables)
    }

    /// Read, verify and decompress one table block
    fn read_table(&mut self, meta: &TableMeta) -> ArchiveResult<Table> {
        self.reader.seek(SeekFrom::Start(meta.offset))?;

        let mut size_buf = [0u8; 4];
        self.reader.read_exact(&mut size_buf)?;
        let size = u32::from_le_bytes(size_buf);
        if size != meta.size {
            return Err(ArchiveError::Corruption(format!(
                "Table '{}' size mismatch: directory={}, block={}",
                meta.key, meta.size, size
            )));
        }

        let mut data = vec![0u8; size as usize];
        self.reader.read_exact(&mut data)?;

        let mut checksum_buf = [0u8; 4];
        self.reader.read_exact(&mut checksum_buf)?;
        let stored_checksum = u32::from_le_bytes(checksum_buf);
        let computed_checksum = crc32fast::hash(&data);

        if stored_checksum != computed_checksum {
            return Err(ArchiveError::Corruption(format!(
                "Table '{}' checksum mismatch",
                meta.key
            )));
        }

        let rows = decompress_rows(&data)?;
        if rows.len() as u64 != meta.row_count {
            return Err(ArchiveError::Corruption(format!(
                "Table '{}' row count mismatch: directory={}, block={}",
                meta.key,
                meta.row_count,
                rows.len()
            )));
        }

        Ok(Table::from_rows(meta.key.clone(), rows))
    }
}

impl Container for ArchiveFile {
    fn location(&self) -> &str {
        &self.location
    }

    fn table(&mut self, key: &str) -> ArchiveResult<Option<Table>> {
        let Some(meta) = self.meta(key).cloned() else {
            return Ok(None);
        };
        tracing::trace!(table = key, rows = meta.row_count, "reading table block");
        self.read_table(&meta).map(Some)
    }
}

/// Opens archive files from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FileOpener;

impl SegmentOpener for FileOpener {
    fn open(&self, location: &str) -> ArchiveResult<Box<dyn Container>> {
        let path = location.strip_prefix("file:").unwrap_or(location);
        Ok(Box::new(ArchiveFile::open(path)?))
    }
}

/// Bounds-checked reader over the footer bytes
struct FooterCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FooterCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take_slice(&mut self, len: usize) -> ArchiveResult<&'a [u8]> {
        let data: &'a [u8] = self.data;
        let end = self.pos + len;
        let slice = data
            .get(self.pos..end)
            .ok_or_else(|| ArchiveError::Corruption("Truncated footer".into()))?;
        self.pos = end;
        Ok(slice)
    }

    fn take<const N: usize>(&mut self) -> ArchiveResult<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take_slice(N)?);
        Ok(buf)
    }
}

fn decompress_rows(data: &[u8]) -> ArchiveResult<Vec<Vec<u8>>> {
    let decompressed = lz4_flex::decompress_size_prepended(data)
        .map_err(|e| ArchiveError::Compression(format!("LZ4 decompression failed: {}", e)))?;
    Ok(bincode::deserialize(&decompressed)?)
}

#[cfg(test)]
fn compress_rows(rows: &[Vec<u8>]) -> ArchiveResult<Vec<u8>> {
    let serialized = bincode::serialize(rows)?;
    Ok(lz4_flex::compress_prepend_size(&serialized))
}

/// Write an archive file holding the given tables
#[cfg(test)]
pub(crate) fn write_archive(path: impl AsRef<Path>, tables: &[Table]) -> ArchiveResult<()> {
    use std::io::{BufWriter, Write};

    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writer.write_all(&ArchiveHeader::new(tables.len() as u32).to_bytes())?;

    let mut offset = HEADER_SIZE as u64;
    let mut footer_data = Vec::new();

    for table in tables {
        let compressed = compress_rows(table.rows())?;
        let checksum = crc32fast::hash(&compressed);
        writer.write_all(&(compressed.len() as u32).to_le_bytes())?;
        writer.write_all(&compressed)?;
        writer.write_all(&checksum.to_le_bytes())?;

        footer_data.extend_from_slice(&(table.key().len() as u16).to_le_bytes());
        footer_data.extend_from_slice(table.key().as_bytes());
        footer_data.extend_from_slice(&offset.to_le_bytes());
        footer_data.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        footer_data.extend_from_slice(&table.len().to_le_bytes());

        offset += compressed.len() as u64 + 8;
    }

    writer.write_all(&footer_data)?;
    writer.write_all(&(footer_data.len() as u32).to_le_bytes())?;
    writer.write_all(&crc32fast::hash(&footer_data).to_le_bytes())?;
    writer.flush()?;

    Ok(())
}

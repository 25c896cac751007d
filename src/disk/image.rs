//! a disk image file mapped into memory
use std::{
    fs::OpenOptions,
    io::{self, Cursor, ErrorKind, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use log::debug;
use memmap2::MmapMut;

use crate::{
    error::{FsError, Result},
    utils::traits::Record,
};

/// A flat image file standing in for a physical disk.
///
/// The whole file is mapped for the lifetime of the handle, every record is
/// read and written at an absolute byte offset.
#[derive(Debug)]
pub struct DiskImage {
    path: PathBuf,
    mmap: MmapMut,
}

impl DiskImage {
    /// create a zero-filled image of `size` bytes, failing if the file exists
    pub fn create<P: AsRef<Path>>(path: P, size: u64) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        // all bytes are zero after `set_len`
        file.set_len(size)?;
        debug!("created image {} with {size} bytes", path.display());
        Self::map(path, &file)
    }

    /// open an existing image for read and write
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => FsError::DiskNotFound(path.display().to_string()),
                _ => FsError::Io(e),
            })?;
        Self::map(path, &file)
    }

    fn map(path: &Path, file: &std::fs::File) -> Result<Self> {
        // Safety
        // This method returns an error when the underlying system call fails,
        // which can happen for a variety of reasons,
        // such as when the file is not open with read and write permissions.
        // from https://docs.rs/memmap2/0.5.10/memmap2/struct.MmapMut.html
        let mmap = unsafe { MmapMut::map_mut(file)? };
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    fn cursor_at(&self, offset: u64) -> Result<Cursor<&[u8]>> {
        if offset > self.len() {
            return Err(out_of_range(offset, self.len()));
        }
        let mut cursor = Cursor::new(&self.mmap[..]);
        cursor.seek(SeekFrom::Start(offset))?;
        Ok(cursor)
    }

    /// decode a record stored at `offset`
    pub fn read_record<T: Record>(&self, offset: u64) -> Result<T> {
        let start = usize::try_from(offset).map_err(|_| out_of_range(offset, self.len()))?;
        let bytes = self
            .mmap
            .get(start..)
            .ok_or_else(|| out_of_range(offset, self.len()))?;
        let (record, _) = T::from_bytes(bytes)?;
        Ok(record)
    }

    /// encode `record` at `offset`, returning the number of bytes written
    pub fn write_record<T: Record>(&mut self, offset: u64, record: &T) -> Result<usize> {
        let bytes = record.to_bytes()?;
        self.write_bytes(offset, &bytes)?;
        Ok(bytes.len())
    }

    pub fn read_bytes(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut cursor = self.cursor_at(offset)?;
        let mut buf = vec![0u8; len];
        cursor.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn write_bytes(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.len() {
            return Err(out_of_range(offset + data.len() as u64, self.len()));
        }
        let mut cursor = Cursor::new(&mut self.mmap[..]);
        cursor.seek(SeekFrom::Start(offset))?;
        cursor.write_all(data)?;
        Ok(())
    }

    /// overwrite `len` bytes starting at `offset` with `byte`
    pub fn fill(&mut self, offset: u64, len: u64, byte: u8) -> Result<()> {
        let end = offset + len;
        if end > self.len() {
            return Err(out_of_range(end, self.len()));
        }
        self.mmap[offset as usize..end as usize].fill(byte);
        Ok(())
    }

    /// write the mapped pages back to the image file
    pub fn flush(&self) -> Result<()> {
        Ok(self.mmap.flush()?)
    }
}

fn out_of_range(offset: u64, len: u64) -> FsError {
    FsError::Io(io::Error::new(
        ErrorKind::UnexpectedEof,
        format!("offset {offset} is beyond the end of the image ({len} bytes)"),
    ))
}

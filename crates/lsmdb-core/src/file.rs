//! The page/block store.
//!
//! A database is a single file divided into fixed-size blocks, each made of
//! pages. Block 0 is reserved for the header slots; every other block holds
//! either segment data or write-ahead log frames. All I/O is positional so
//! concurrent readers never share a cursor into the file.

use crate::config::Config;
use crate::error::{Error, Result};
use memmap2::Mmap;
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::{debug, warn};

/// Identifier of a block inside the file.
pub type BlockId = u64;

/// An open database file.
#[derive(Debug)]
pub struct DbFile {
    file: File,
    path: PathBuf,
    page_size: u32,
    block_bytes: u64,
    readonly: bool,
    locked: AtomicBool,
    map: Option<RwLock<Option<Mmap>>>,
    pages_read: AtomicU64,
    pages_written: AtomicU64,
}

impl DbFile {
    /// Opens (or creates) the file at `path` using the geometry in `config`.
    ///
    /// When `config.multiple_processes` is set an advisory lock is taken:
    /// shared for readonly handles, exclusive otherwise. A held lock fails
    /// with [`Error::Busy`].
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = if config.readonly {
            OpenOptions::new().read(true).open(&path)?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?
        };

        let locked = if config.multiple_processes {
            let attempt = if config.readonly {
                file.try_lock_shared()
            } else {
                file.try_lock()
            };
            match attempt {
                Ok(()) => true,
                Err(TryLockError::WouldBlock) => {
                    return Err(Error::Busy(format!(
                        "{} is locked by another handle",
                        path.display()
                    )))
                }
                Err(TryLockError::Error(e)) => return Err(Error::Io(e)),
            }
        } else {
            false
        };

        // Mapped reads assume no other process rewrites blocks under us.
        let map = (config.mmap && !config.multiple_processes).then(|| RwLock::new(None));

        debug!(path = %path.display(), locked, mmap = map.is_some(), "Opened database file");

        Ok(Self {
            file,
            path,
            page_size: config.page_size,
            block_bytes: config.block_bytes(),
            readonly: config.readonly,
            locked: AtomicBool::new(locked),
            map,
            pages_read: AtomicU64::new(0),
            pages_written: AtomicU64::new(0),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Block size in bytes.
    pub fn block_bytes(&self) -> u64 {
        self.block_bytes
    }

    /// Whether the file was opened without write access.
    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Switches to the geometry recorded in an existing file's header.
    pub fn adopt_geometry(&mut self, page_size: u32, block_bytes: u64) {
        if page_size != self.page_size || block_bytes != self.block_bytes {
            warn!(
                page_size,
                block_kb = block_bytes / 1024,
                "Using page and block size recorded in the existing file"
            );
        }
        self.page_size = page_size;
        self.block_bytes = block_bytes;
    }

    /// Current file length in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Returns `true` if the file holds no data.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of whole or partial blocks the file spans.
    pub fn block_count(&self) -> Result<u64> {
        Ok(self.len()?.div_ceil(self.block_bytes))
    }

    /// Byte offset of the start of `block`.
    pub fn block_offset(&self, block: BlockId) -> u64 {
        block * self.block_bytes
    }

    /// Reads up to `buf.len()` bytes at `offset` without counting pages.
    ///
    /// Bytes past the end of the file read as zero. Returns the number of
    /// bytes actually present in the file.
    pub fn read_raw(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = pread(&self.file, &mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf[filled..].fill(0);
        Ok(filled)
    }

    /// Writes `data` at `offset` without counting pages.
    pub fn write_raw(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.check_writable()?;
        pwrite_all(&self.file, data, offset)
    }

    /// Reads segment data, counting every page the range touches.
    pub fn read_pages(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let end = offset + buf.len() as u64;
        if !self.read_mapped(offset, buf)? {
            let n = self.read_raw(offset, buf)?;
            if n < buf.len() {
                return Err(Error::Corruption(format!(
                    "read of {} bytes at offset {} runs past end of file",
                    buf.len(),
                    offset
                )));
            }
        }
        self.pages_read
            .fetch_add(self.pages_spanned(offset, end), Ordering::Relaxed);
        Ok(())
    }

    /// Writes segment data, counting every page the range touches.
    pub fn write_pages(&self, offset: u64, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.write_raw(offset, data)?;
        let end = offset + data.len() as u64;
        self.pages_written
            .fetch_add(self.pages_spanned(offset, end), Ordering::Relaxed);
        Ok(())
    }

    /// Forces written data to stable storage.
    pub fn sync(&self) -> Result<()> {
        if self.readonly {
            return Ok(());
        }
        self.file.sync_data()?;
        Ok(())
    }

    /// Pages read from segments since this handle was opened.
    pub fn pages_read(&self) -> u64 {
        self.pages_read.load(Ordering::Relaxed)
    }

    /// Pages written to segments since this handle was opened.
    pub fn pages_written(&self) -> u64 {
        self.pages_written.load(Ordering::Relaxed)
    }

    /// Releases the advisory lock, if one is held.
    pub fn unlock(&self) -> Result<()> {
        if self.locked.swap(false, Ordering::AcqRel) {
            self.file.unlock()?;
        }
        Ok(())
    }

    fn pages_spanned(&self, start: u64, end: u64) -> u64 {
        let page = u64::from(self.page_size);
        (end - 1) / page - start / page + 1
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(Error::Misuse("database was opened readonly".into()));
        }
        Ok(())
    }

    /// Serves a read from the memory map, remapping once if the file grew.
    /// Returns `false` when mapping is disabled.
    fn read_mapped(&self, offset: u64, buf: &mut [u8]) -> Result<bool> {
        let Some(map) = &self.map else {
            return Ok(false);
        };
        let start = offset as usize;
        let end = start + buf.len();
        {
            let guard = map.read().map_err(|_| Error::LockPoisoned)?;
            if let Some(mmap) = guard.as_ref() {
                if end <= mmap.len() {
                    buf.copy_from_slice(&mmap[start..end]);
                    return Ok(true);
                }
            }
        }

        let mut guard = map.write().map_err(|_| Error::LockPoisoned)?;
        // SAFETY: segment blocks are immutable once published and the file
        // is never truncated while the handle is open.
        let mmap = unsafe { Mmap::map(&self.file)? };
        if end > mmap.len() {
            return Err(Error::Corruption(format!(
                "read of {} bytes at offset {} runs past end of file",
                buf.len(),
                offset
            )));
        }
        buf.copy_from_slice(&mmap[start..end]);
        *guard = Some(mmap);
        Ok(true)
    }
}

impl Drop for DbFile {
    fn drop(&mut self) {
        if let Err(e) = self.unlock() {
            warn!(error = %e, "Failed to release database file lock");
        }
    }
}

#[cfg(unix)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> Result<usize> {
    use std::os::unix::fs::FileExt;
    loop {
        match file.read_at(buf, offset) {
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            other => return Ok(other?),
        }
    }
}

#[cfg(unix)]
fn pwrite_all(file: &File, data: &[u8], offset: u64) -> Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(data, offset)?;
    Ok(())
}

#[cfg(windows)]
fn pread(file: &File, buf: &mut [u8], offset: u64) -> Result<usize> {
    use std::os::windows::fs::FileExt;
    Ok(file.seek_read(buf, offset)?)
}

#[cfg(windows)]
fn pwrite_all(file: &File, mut data: &[u8], mut offset: u64) -> Result<()> {
    use std::os::windows::fs::FileExt;
    while !data.is_empty() {
        let n = file.seek_write(data, offset)?;
        if n == 0 {
            return Err(Error::Io(std::io::ErrorKind::WriteZero.into()));
        }
        data = &data[n..];
        offset += n as u64;
    }
    Ok(())
}

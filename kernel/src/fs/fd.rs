/// File-descriptor layer over the ISO 9660 reader.
///
/// A fixed table of 16 slots, ring-0 only. A slot owns a copy of the
/// file's directory record plus the read offset; the descriptor number is
/// the slot index. Files are read-only — this is a CD.
use super::block::{BlockDevice, CD_BLOCK_SIZE};
use super::iso9660::IsoDir;
use super::volume::{IsoError, IsoVolume};
use crate::drivers::atapi::AtapiError;
use alloc::vec::Vec;
use core::fmt;
use spin::Mutex;

pub const MAX_FDS: usize = 16;

/// The only flag value `open` accepts.
pub const O_RDONLY: u32 = 0;

/// `seek` reference points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl Whence {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Whence::Set),
            1 => Some(Whence::Cur),
            2 => Some(Whence::End),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// The underlying device failed.
    Device(AtapiError),
    /// Anything but read-only was requested.
    BadFlags,
    /// Descriptor out of range or slot empty.
    BadDescriptor,
    /// Seek target negative or past EOF.
    BadOffset,
    /// Path did not resolve to a file.
    NotFound,
    /// All 16 slots are in use.
    TableFull,
}

impl From<IsoError> for FsError {
    fn from(err: IsoError) -> Self {
        match err {
            IsoError::Device(dev) => FsError::Device(dev),
            IsoError::BadVolume | IsoError::NotFound => FsError::NotFound,
        }
    }
}

impl From<AtapiError> for FsError {
    fn from(err: AtapiError) -> Self {
        FsError::Device(err)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Device(err) => write!(f, "device: {err}"),
            FsError::BadFlags => write!(f, "only read-only access is supported"),
            FsError::BadDescriptor => write!(f, "bad file descriptor"),
            FsError::BadOffset => write!(f, "offset out of range"),
            FsError::NotFound => write!(f, "no such file"),
            FsError::TableFull => write!(f, "no free file descriptors"),
        }
    }
}

#[derive(Clone, Copy)]
struct FileDescriptor {
    record: IsoDir,
    offset: u32,
}

pub struct FdTable {
    slots: [Option<FileDescriptor>; MAX_FDS],
}

impl FdTable {
    pub const fn new() -> Self {
        Self {
            slots: [None; MAX_FDS],
        }
    }

    /// Open `path` read-only: mount the volume, navigate to the containing
    /// directory, find the file record, park it in the first free slot.
    /// The path is upper-cased first — ISO 9660 identifiers are upper-case
    /// in the profile this kernel reads.
    pub fn open(
        &mut self,
        dev: &mut dyn BlockDevice,
        path: &[u8],
        flags: u32,
    ) -> Result<usize, FsError> {
        if flags != O_RDONLY {
            return Err(FsError::BadFlags);
        }
        let fd = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TableFull)?;

        let mut iso_path: Vec<u8> = path.to_vec();
        iso_path.make_ascii_uppercase();

        // The volume (PVD block, path table, index) lives for this open
        // only; it drops — releasing all three buffers — on every path
        // out of this function.
        let volume = IsoVolume::mount(dev)?;
        let (dir_id, basename) = volume.navigate(&iso_path).ok_or(FsError::NotFound)?;
        let record = volume.find_file(dev, dir_id, basename)?;

        self.slots[fd] = Some(FileDescriptor { record, offset: 0 });
        Ok(fd)
    }

    /// Read up to `buf.len()` bytes from the current offset. Returns the
    /// byte count, 0 at (or past) EOF. Reads span block boundaries by
    /// copying `min(remaining_in_block, remaining_count)` per block.
    pub fn read(
        &mut self,
        dev: &mut dyn BlockDevice,
        fd: usize,
        buf: &mut [u8],
    ) -> Result<usize, FsError> {
        let slot = self
            .slots
            .get_mut(fd)
            .ok_or(FsError::BadDescriptor)?
            .as_mut()
            .ok_or(FsError::BadDescriptor)?;

        let size = slot.record.size();
        let pos = slot.offset;
        if pos >= size {
            return Ok(0);
        }

        let count = buf.len().min((size - pos) as usize);
        let mut lba = slot.record.extent() + pos / CD_BLOCK_SIZE as u32;
        let mut in_block = pos as usize % CD_BLOCK_SIZE;
        let mut copied = 0;

        while copied < count {
            let block = dev.read_block(lba)?;
            let take = (CD_BLOCK_SIZE - in_block).min(count - copied);
            buf[copied..copied + take].copy_from_slice(&block[in_block..in_block + take]);
            copied += take;
            in_block = 0;
            lba += 1;
        }

        slot.offset += count as u32;
        Ok(count)
    }

    /// Move the read offset. The result must stay inside [0, size].
    pub fn seek(&mut self, fd: usize, offset: i32, whence: Whence) -> Result<u32, FsError> {
        let slot = self
            .slots
            .get_mut(fd)
            .ok_or(FsError::BadDescriptor)?
            .as_mut()
            .ok_or(FsError::BadDescriptor)?;

        let size = slot.record.size() as i64;
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => slot.offset as i64,
            Whence::End => size,
        };
        let target = base + offset as i64;
        if target < 0 || target > size {
            return Err(FsError::BadOffset);
        }

        slot.offset = target as u32;
        Ok(slot.offset)
    }

    /// Release the record and free the slot.
    pub fn close(&mut self, fd: usize) -> Result<(), FsError> {
        let slot = self.slots.get_mut(fd).ok_or(FsError::BadDescriptor)?;
        if slot.is_none() {
            return Err(FsError::BadDescriptor);
        }
        *slot = None;
        Ok(())
    }

    /// Number of occupied slots.
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// Process-wide descriptor table behind the syscall surface.
pub static FD_TABLE: Mutex<FdTable> = Mutex::new(FdTable::new());

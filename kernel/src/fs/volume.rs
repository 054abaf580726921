/// ISO 9660 volume reader.
///
/// Mounting reads the Primary Volume Descriptor, concatenates the
/// little-endian path table into one buffer, and builds the id index over
/// it: entry ids are assigned 1, 2, … in table order, the root is id 1 and
/// is its own parent. Navigation walks `/`-separated components through
/// the index down to the directory that contains the target, and
/// `find_file` scans that directory's records for the name.
use super::block::{Block, BlockDevice, CD_BLOCK_SIZE};
use super::iso9660::{self, IsoDir, IsoPrimVolDesc};
use crate::drivers::atapi::AtapiError;
use alloc::vec::Vec;
use core::fmt;

/// The PVD always lives at logical block 16.
pub const PVD_LBA: u32 = 16;

/// Path-table id of the root directory.
pub const ROOT_ID: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoError {
    /// The underlying device failed.
    Device(AtapiError),
    /// Block 16 does not hold a primary volume descriptor.
    BadVolume,
    /// A path component or the file itself was not found.
    NotFound,
}

impl From<AtapiError> for IsoError {
    fn from(err: AtapiError) -> Self {
        IsoError::Device(err)
    }
}

impl fmt::Display for IsoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsoError::Device(err) => write!(f, "device: {err}"),
            IsoError::BadVolume => write!(f, "not an ISO 9660 volume"),
            IsoError::NotFound => write!(f, "no such file or directory"),
        }
    }
}

/// One path-table index entry. The name is kept as a range into the
/// shared path-table buffer rather than a copy.
pub struct PathEntry {
    pub id: u32,
    pub parent: u16,
    pub extent: u32,
    name_off: usize,
    name_len: usize,
}

/// A mounted volume: the PVD block, the concatenated path table, and the
/// id index over it. All three drop together when the volume goes out of
/// scope.
pub struct IsoVolume {
    pvd: Block,
    path_table: Vec<u8>,
    index: Vec<PathEntry>,
}

impl IsoVolume {
    /// Read the PVD and the path table, build the index.
    pub fn mount(dev: &mut dyn BlockDevice) -> Result<Self, IsoError> {
        let pvd_block = dev.read_block(PVD_LBA)?;
        let pvd = IsoPrimVolDesc::from_block(&pvd_block[..]).ok_or(IsoError::BadVolume)?;
        if !pvd.is_valid() {
            return Err(IsoError::BadVolume);
        }

        let extent = pvd.le_path_table_blk;
        let size = pvd.path_table_size.le;

        let path_table = read_path_table(dev, extent, size)?;
        let index = build_index(&path_table[..size as usize]);
        if index.is_empty() {
            return Err(IsoError::BadVolume);
        }

        Ok(Self {
            pvd: pvd_block,
            path_table,
            index,
        })
    }

    pub fn pvd(&self) -> &IsoPrimVolDesc {
        // Safety: mount validated the block; the buffer outlives the view.
        unsafe { &*(self.pvd.as_ptr() as *const IsoPrimVolDesc) }
    }

    /// The 32-byte volume identifier from the PVD.
    pub fn volume_identifier(&self) -> &[u8; 32] {
        &self.pvd().vol_idf
    }

    pub fn index(&self) -> &[PathEntry] {
        &self.index
    }

    /// Identifier bytes of an index entry.
    pub fn entry_name(&self, entry: &PathEntry) -> &[u8] {
        &self.path_table[entry.name_off..entry.name_off + entry.name_len]
    }

    /// Find the id of the entry named `name` under `parent`. First match
    /// in table order wins; 0 never names an entry.
    pub fn resolve_id(&self, parent: u32, name: &[u8]) -> Option<u32> {
        self.index
            .iter()
            .find(|entry| entry.parent as u32 == parent && self.entry_name(entry) == name)
            .map(|entry| entry.id)
    }

    /// Walk `path`'s components from the root, stopping at the final one.
    /// Returns the id of the directory that contains the target, and the
    /// target's name.
    pub fn navigate<'p>(&self, path: &'p [u8]) -> Option<(u32, &'p [u8])> {
        let basename = path
            .rsplit(|&b| b == b'/')
            .find(|component| !component.is_empty())?;

        let mut current = ROOT_ID;
        for component in path.split(|&b| b == b'/').filter(|c| !c.is_empty()) {
            if component == basename {
                break;
            }
            current = self.resolve_id(current, component)?;
        }
        Some((current, basename))
    }

    /// Read the directory `dir_id` points at and scan its records for
    /// `name`. On a hit the record header is copied out so it outlives
    /// the directory block.
    pub fn find_file(
        &self,
        dev: &mut dyn BlockDevice,
        dir_id: u32,
        name: &[u8],
    ) -> Result<IsoDir, IsoError> {
        let entry = self
            .index
            .get(dir_id.wrapping_sub(1) as usize)
            .ok_or(IsoError::NotFound)?;
        let block = dev.read_block(entry.extent)?;
        scan_directory(&block[..], name).ok_or(IsoError::NotFound)
    }
}

/// Read `ceil(size / 2048)` consecutive blocks from `extent` into one
/// buffer. Each intermediate block is released as soon as it is copied.
pub fn read_path_table(
    dev: &mut dyn BlockDevice,
    extent: u32,
    size: u32,
) -> Result<Vec<u8>, IsoError> {
    let nb_blocks = (size as usize).div_ceil(CD_BLOCK_SIZE);
    let mut table = Vec::with_capacity(nb_blocks * CD_BLOCK_SIZE);
    for i in 0..nb_blocks as u32 {
        let block = dev.read_block(extent + i)?;
        table.extend_from_slice(&block[..]);
    }
    Ok(table)
}

/// Count the entries in a path-table buffer.
pub fn path_table_entry_count(table: &[u8]) -> usize {
    let mut count = 0;
    let mut offset = 0;
    while let Some(header) = iso9660::path_table_header(table, offset) {
        if header.idf_len == 0 {
            break;
        }
        count += 1;
        offset += header.entry_len();
    }
    count
}

/// Single forward pass over the path table: assign ids from 1 in entry
/// order, record each entry's parent, extent and name range.
pub fn build_index(table: &[u8]) -> Vec<PathEntry> {
    let mut index = Vec::with_capacity(path_table_entry_count(table));
    let mut offset = 0;
    let mut id = ROOT_ID;

    while let Some(header) = iso9660::path_table_header(table, offset) {
        if header.idf_len == 0 {
            break;
        }
        let name_off = offset + core::mem::size_of::<iso9660::IsoPathTable>();
        let name_len = header.idf_len as usize;
        if name_off + name_len > table.len() {
            break;
        }
        index.push(PathEntry {
            id,
            parent: header.parent_dir,
            extent: header.data_blk,
            name_off,
            name_len,
        });
        offset += header.entry_len();
        id += 1;
    }
    index
}

/// Walk the variable-length records of one directory block. A record
/// length of zero (the block's zero padding) or an empty identifier ends
/// the directory; the block boundary ends the scan regardless.
fn scan_directory(block: &[u8], name: &[u8]) -> Option<IsoDir> {
    let mut offset = 0;
    while let Some(record) = iso9660::dir_record_header(block, offset) {
        if record.dir_size == 0 || record.idf_len == 0 {
            return None;
        }

        let idf_start = offset + core::mem::size_of::<IsoDir>();
        let idf_len = record.idf_len as usize;
        let stored = block.get(idf_start..idf_start + idf_len)?;

        // File identifiers carry a ";1" version suffix; directories don't.
        let trimmed = idf_len.saturating_sub(2);
        if &stored[..trimmed] == name {
            return Some(record);
        }

        offset += record.dir_size as usize;
    }
    None
}

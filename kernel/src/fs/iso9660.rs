/// On-disk ISO 9660 structures.
///
/// Everything here is the exact wire layout: packed, little-endian views
/// consumed, sizes pinned by const asserts. Multi-byte integers the
/// standard records in both byte orders are kept as `LsbMsb` pairs; only
/// the `le` half is ever read.
use bitflags::bitflags;
use core::mem::{offset_of, size_of};

/// Dual-endian 16-bit integer (little-endian copy first).
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct LsbMsb16 {
    pub le: u16,
    pub be: u16,
}

/// Dual-endian 32-bit integer (little-endian copy first).
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct LsbMsb32 {
    pub le: u32,
    pub be: u32,
}

bitflags! {
    /// Directory-record file flags.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FileFlags: u8 {
        const HIDDEN       = 0x01;
        const DIRECTORY    = 0x02;
        const ASSOCIATED   = 0x04;
        const RECORD       = 0x08;
        const PROTECTED    = 0x10;
        const MULTI_EXTENT = 0x80;
    }
}

/// Directory record header (33 bytes); the identifier bytes follow it,
/// padded so the next record starts on an even offset.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct IsoDir {
    /// Total record length, identifier and padding included.
    pub dir_size: u8,
    pub ext_size: u8,
    pub data_blk: LsbMsb32,
    pub file_size: LsbMsb32,
    pub date: [u8; 7],
    pub file_flags: u8,
    pub unit_size: u8,
    pub gap_size: u8,
    pub vol_seq: LsbMsb16,
    pub idf_len: u8,
}

static_assertions::const_assert_eq!(size_of::<IsoDir>(), 33);

impl IsoDir {
    /// First logical block of the file data.
    pub fn extent(&self) -> u32 {
        self.data_blk.le
    }

    /// File data length in bytes.
    pub fn size(&self) -> u32 {
        self.file_size.le
    }

    pub fn flags(&self) -> FileFlags {
        FileFlags::from_bits_truncate(self.file_flags)
    }

    pub fn is_directory(&self) -> bool {
        self.flags().contains(FileFlags::DIRECTORY)
    }
}

/// Path table entry header (little-endian table). The identifier bytes
/// follow, plus one pad byte when the identifier length is odd.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct IsoPathTable {
    pub idf_len: u8,
    pub ext_size: u8,
    pub data_blk: u32,
    pub parent_dir: u16,
}

static_assertions::const_assert_eq!(size_of::<IsoPathTable>(), 8);

impl IsoPathTable {
    /// Full on-disk entry length: header + identifier + parity pad.
    pub fn entry_len(&self) -> usize {
        let idf_len = self.idf_len as usize;
        size_of::<Self>() + idf_len + (idf_len & 1)
    }
}

/// Primary Volume Descriptor — the fixed 2048-byte record at LBA 16.
#[repr(C, packed)]
pub struct IsoPrimVolDesc {
    pub vol_desc_type: u8,
    pub std_identifier: [u8; 5],
    pub vol_desc_version: u8,
    _unused0: u8,
    pub syst_idf: [u8; 32],
    pub vol_idf: [u8; 32],
    _unused1: [u8; 8],
    pub vol_blk_count: LsbMsb32,
    _unused2: [u8; 32],
    pub vol_set_size: LsbMsb16,
    pub vol_seq_num: LsbMsb16,
    pub vol_blk_size: LsbMsb16,
    pub path_table_size: LsbMsb32,
    pub le_path_table_blk: u32,
    pub le_opt_path_table_blk: u32,
    pub be_path_table_blk: u32,
    pub be_opt_path_table_blk: u32,
    pub root_dir: IsoDir,
    pub root_dir_idf: u8,
    pub vol_set_idf: [u8; 128],
    pub publisher_idf: [u8; 128],
    pub dprep_idf: [u8; 128],
    pub app_idf: [u8; 128],
    pub copyright_file_idf: [u8; 37],
    pub abstract_file_idf: [u8; 37],
    pub bibli_file_idf: [u8; 37],
    pub date_creat: [u8; 17],
    pub date_modif: [u8; 17],
    pub date_expir: [u8; 17],
    pub date_effect: [u8; 17],
    pub file_struct_version: u8,
    _unused3: u8,
    pub app_data: [u8; 512],
    _reserved: [u8; 653],
}

static_assertions::const_assert_eq!(size_of::<IsoPrimVolDesc>(), 2048);
static_assertions::const_assert_eq!(offset_of!(IsoPrimVolDesc, vol_idf), 40);
static_assertions::const_assert_eq!(offset_of!(IsoPrimVolDesc, path_table_size), 132);
static_assertions::const_assert_eq!(offset_of!(IsoPrimVolDesc, le_path_table_blk), 140);
static_assertions::const_assert_eq!(offset_of!(IsoPrimVolDesc, root_dir), 156);

impl IsoPrimVolDesc {
    /// Volume descriptor type for a PVD.
    pub const PRIMARY_TYPE: u8 = 1;
    /// Standard identifier every ISO 9660 descriptor carries.
    pub const STANDARD_ID: &'static [u8; 5] = b"CD001";

    /// View a 2048-byte block as a PVD. The cast is layout-only; callers
    /// still check `is_valid`.
    pub fn from_block(block: &[u8]) -> Option<&Self> {
        if block.len() < size_of::<Self>() {
            return None;
        }
        // Safety: the struct is packed (align 1) and `block` holds at
        // least size_of::<Self>() bytes.
        Some(unsafe { &*(block.as_ptr() as *const Self) })
    }

    pub fn is_valid(&self) -> bool {
        self.vol_desc_type == Self::PRIMARY_TYPE && self.std_identifier == *Self::STANDARD_ID
    }
}

/// Read a path-table entry header at `offset`, if one fits.
pub fn path_table_header(buf: &[u8], offset: usize) -> Option<IsoPathTable> {
    if offset + size_of::<IsoPathTable>() > buf.len() {
        return None;
    }
    // Safety: bounds checked above; read_unaligned copes with align 1.
    Some(unsafe { core::ptr::read_unaligned(buf.as_ptr().add(offset) as *const IsoPathTable) })
}

/// Read a directory-record header at `offset`, if one fits.
pub fn dir_record_header(buf: &[u8], offset: usize) -> Option<IsoDir> {
    if offset + size_of::<IsoDir>() > buf.len() {
        return None;
    }
    // Safety: bounds checked above; read_unaligned copes with align 1.
    Some(unsafe { core::ptr::read_unaligned(buf.as_ptr().add(offset) as *const IsoDir) })
}

pub mod block;
pub mod fd;
pub mod iso9660;
pub mod mock_cd;
pub mod volume;

pub use block::{Block, BlockDevice, CD_BLOCK_SIZE};
pub use fd::{FdTable, FsError, Whence, FD_TABLE, MAX_FDS, O_RDONLY};
pub use volume::{IsoError, IsoVolume};

#[cfg(test)]
mod tests;

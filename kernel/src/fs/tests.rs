/// Unit tests for the ISO 9660 reader and the fd layer.
///
/// A synthetic image — PVD, little-endian path table, directory blocks,
/// file extents — is built in RAM and served through the `RamCd` mock, so
/// the whole open/read/seek/close path runs without hardware.
use super::mock_cd::RamCd;
use super::volume::{self, IsoVolume};
use super::*;
use alloc::vec;
use alloc::vec::Vec;

const IMAGE_BLOCKS: usize = 40;

const PATH_TABLE_LBA: u32 = 18;
const ROOT_DIR_LBA: u32 = 20;
const RES_DIR_LBA: u32 = 23;
const BALL_LBA: u32 = 30;
const HELLO_LBA: u32 = 35;

/// Spans two full blocks plus a 904-byte tail.
const BALL_SIZE: u32 = 5000;
const HELLO_CONTENT: &[u8] = b"Hello, World!";

struct ImageBuilder {
    data: Vec<u8>,
}

impl ImageBuilder {
    fn new(blocks: usize) -> Self {
        Self {
            data: vec![0u8; blocks * CD_BLOCK_SIZE],
        }
    }

    fn write(&mut self, lba: u32, offset: usize, bytes: &[u8]) {
        let start = lba as usize * CD_BLOCK_SIZE + offset;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

fn push_path_entry(table: &mut Vec<u8>, name: &[u8], extent: u32, parent: u16) {
    table.push(name.len() as u8);
    table.push(0); // extended attribute length
    table.extend_from_slice(&extent.to_le_bytes());
    table.extend_from_slice(&parent.to_le_bytes());
    table.extend_from_slice(name);
    if name.len() % 2 == 1 {
        table.push(0); // even-alignment pad
    }
}

fn dir_record(name: &[u8], extent: u32, size: u32, flags: u8) -> Vec<u8> {
    let record_len = 33 + name.len() + (33 + name.len()) % 2;
    let mut record = Vec::with_capacity(record_len);
    record.push(record_len as u8);
    record.push(0); // extended attribute length
    record.extend_from_slice(&extent.to_le_bytes());
    record.extend_from_slice(&extent.to_be_bytes());
    record.extend_from_slice(&size.to_le_bytes());
    record.extend_from_slice(&size.to_be_bytes());
    record.extend_from_slice(&[0u8; 7]); // datetime
    record.push(flags);
    record.push(0); // unit size
    record.push(0); // interleave gap
    record.extend_from_slice(&1u16.to_le_bytes());
    record.extend_from_slice(&1u16.to_be_bytes());
    record.push(name.len() as u8);
    record.extend_from_slice(name);
    record.resize(record_len, 0);
    record
}

fn ball_bytes() -> Vec<u8> {
    let mut bytes: Vec<u8> = (0..BALL_SIZE).map(|i| (i * 7 % 251) as u8).collect();
    // BMP-style magic at the start, like the assets the ROM loads.
    bytes[0] = b'B';
    bytes[1] = b'M';
    bytes
}

/// `/USR/PONG/RES/BALL.BMP` plus `/HELLO.TXT`, with the volume identifier
/// `"SHARK"` (space-padded).
fn build_image() -> Vec<u8> {
    let mut image = ImageBuilder::new(IMAGE_BLOCKS);

    // Little-endian path table: root, then one chain of directories.
    let mut table = Vec::new();
    push_path_entry(&mut table, &[0], ROOT_DIR_LBA, 1);
    push_path_entry(&mut table, b"USR", 21, 1);
    push_path_entry(&mut table, b"PONG", 22, 2);
    push_path_entry(&mut table, b"RES", RES_DIR_LBA, 3);
    let table_size = table.len() as u32;
    image.write(PATH_TABLE_LBA, 0, &table);

    // Primary volume descriptor at LBA 16.
    let mut pvd = vec![0u8; CD_BLOCK_SIZE];
    pvd[0] = 1; // primary
    pvd[1..6].copy_from_slice(b"CD001");
    pvd[6] = 1; // version
    let mut vol_idf = [b' '; 32];
    vol_idf[..5].copy_from_slice(b"SHARK");
    pvd[40..72].copy_from_slice(&vol_idf);
    pvd[132..136].copy_from_slice(&table_size.to_le_bytes());
    pvd[136..140].copy_from_slice(&table_size.to_be_bytes());
    pvd[140..144].copy_from_slice(&PATH_TABLE_LBA.to_le_bytes());
    image.write(16, 0, &pvd);

    // Root directory: ".", "..", USR/, HELLO.TXT.
    let mut root = Vec::new();
    root.extend_from_slice(&dir_record(&[0], ROOT_DIR_LBA, 2048, 0x02));
    root.extend_from_slice(&dir_record(&[1], ROOT_DIR_LBA, 2048, 0x02));
    root.extend_from_slice(&dir_record(b"USR", 21, 2048, 0x02));
    root.extend_from_slice(&dir_record(
        b"HELLO.TXT;1",
        HELLO_LBA,
        HELLO_CONTENT.len() as u32,
        0,
    ));
    image.write(ROOT_DIR_LBA, 0, &root);

    // RES directory: ".", "..", BALL.BMP.
    let mut res = Vec::new();
    res.extend_from_slice(&dir_record(&[0], RES_DIR_LBA, 2048, 0x02));
    res.extend_from_slice(&dir_record(&[1], 22, 2048, 0x02));
    res.extend_from_slice(&dir_record(b"BALL.BMP;1", BALL_LBA, BALL_SIZE, 0));
    image.write(RES_DIR_LBA, 0, &res);

    // File contents.
    image.write(BALL_LBA, 0, &ball_bytes());
    image.write(HELLO_LBA, 0, HELLO_CONTENT);

    image.data
}

fn test_cd() -> RamCd {
    RamCd::new(build_image())
}

// ---- Volume: path table and index ----

#[test]
fn index_length_matches_entry_count() {
    let mut cd = test_cd();
    let volume = IsoVolume::mount(&mut cd).unwrap();
    let count = {
        let pvd = volume.pvd();
        let size = pvd.path_table_size.le;
        let table = volume::read_path_table(&mut cd, pvd.le_path_table_blk, size).unwrap();
        volume::path_table_entry_count(&table[..size as usize])
    };
    assert_eq!(volume.index().len(), count);
    assert_eq!(count, 4);
}

#[test]
fn ids_are_contiguous_from_one_and_root_is_self_parented() {
    let mut cd = test_cd();
    let volume = IsoVolume::mount(&mut cd).unwrap();
    for (i, entry) in volume.index().iter().enumerate() {
        assert_eq!(entry.id, i as u32 + 1);
    }
    assert_eq!(volume.index()[0].parent, 1);
}

#[test]
fn resolve_id_respects_parent_links() {
    let mut cd = test_cd();
    let volume = IsoVolume::mount(&mut cd).unwrap();
    let usr = volume.resolve_id(1, b"USR").unwrap();
    let pong = volume.resolve_id(usr, b"PONG").unwrap();
    let res = volume.resolve_id(pong, b"RES").unwrap();
    assert_eq!((usr, pong, res), (2, 3, 4));

    assert_eq!(volume.resolve_id(1, b"PONG"), None); // wrong parent
    assert_eq!(volume.resolve_id(1, b"NOPE"), None);
}

#[test]
fn navigate_returns_containing_directory_and_basename() {
    let mut cd = test_cd();
    let volume = IsoVolume::mount(&mut cd).unwrap();

    let (dir, base) = volume.navigate(b"/USR/PONG/RES/BALL.BMP").unwrap();
    assert_eq!(dir, 4);
    assert_eq!(base, b"BALL.BMP");

    let (dir, base) = volume.navigate(b"/HELLO.TXT").unwrap();
    assert_eq!(dir, 1);
    assert_eq!(base, b"HELLO.TXT");

    assert!(volume.navigate(b"/").is_none());
    // The first missing component fails navigation, not find_file.
    assert!(volume.navigate(b"/NOPE/MISSING.BIN").is_none());
}

#[test]
fn find_file_strips_version_suffix() {
    let mut cd = test_cd();
    let volume = IsoVolume::mount(&mut cd).unwrap();
    let record = volume.find_file(&mut cd, 4, b"BALL.BMP").unwrap();
    assert_eq!(record.extent(), BALL_LBA);
    assert_eq!(record.size(), BALL_SIZE);

    assert!(volume.find_file(&mut cd, 4, b"MISSING.BIN").is_err());
}

#[test]
fn volume_identifier_is_read_from_pvd() {
    let mut cd = test_cd();
    let volume = IsoVolume::mount(&mut cd).unwrap();
    assert_eq!(&volume.volume_identifier()[..5], b"SHARK");
    assert!(volume.volume_identifier()[5..].iter().all(|&b| b == b' '));
}

#[test]
fn mount_rejects_a_non_iso_image() {
    let mut cd = RamCd::new(vec![0u8; IMAGE_BLOCKS * CD_BLOCK_SIZE]);
    assert!(matches!(
        IsoVolume::mount(&mut cd),
        Err(IsoError::BadVolume)
    ));
}

// ---- Fd layer ----

#[test]
fn open_uppercases_the_path() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let fd = table
        .open(&mut cd, b"/usr/pong/res/ball.bmp", O_RDONLY)
        .unwrap();
    assert_eq!(fd, 0);
}

#[test]
fn open_rejects_non_readonly_flags() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    assert_eq!(
        table.open(&mut cd, b"/HELLO.TXT", 1),
        Err(FsError::BadFlags)
    );
}

#[test]
fn open_unknown_path_fails() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    assert_eq!(
        table.open(&mut cd, b"/nope/missing.bin", O_RDONLY),
        Err(FsError::NotFound)
    );
}

#[test]
fn read_returns_file_bytes() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let fd = table.open(&mut cd, b"/HELLO.TXT", O_RDONLY).unwrap();

    let mut buf = [0u8; 64];
    let n = table.read(&mut cd, fd, &mut buf).unwrap();
    assert_eq!(n, HELLO_CONTENT.len());
    assert_eq!(&buf[..n], HELLO_CONTENT);
}

#[test]
fn read_first_bytes_of_bmp() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let fd = table
        .open(&mut cd, b"/USR/PONG/RES/BALL.BMP", O_RDONLY)
        .unwrap();

    let mut buf = [0u8; 14];
    assert_eq!(table.read(&mut cd, fd, &mut buf).unwrap(), 14);
    assert_eq!(&buf[..2], b"BM");
    assert_eq!(table.close(fd), Ok(()));

    // The slot is free again; a second open reuses it.
    let fd2 = table
        .open(&mut cd, b"/USR/PONG/RES/BALL.BMP", O_RDONLY)
        .unwrap();
    assert_eq!(fd2, fd);
}

#[test]
fn reads_split_at_block_boundaries_match_one_big_read() {
    let expected = ball_bytes();
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let fd = table
        .open(&mut cd, b"/USR/PONG/RES/BALL.BMP", O_RDONLY)
        .unwrap();

    // (offset, count) pairs crossing none, one and two boundaries.
    for &(offset, count) in &[
        (0usize, 100usize),
        (2040, 16),
        (2048, 2048),
        (4095, 10),
        (0, BALL_SIZE as usize),
        (4090, 910),
    ] {
        let mut whole = vec![0u8; count];
        table.seek(fd, offset as i32, Whence::Set).unwrap();
        assert_eq!(table.read(&mut cd, fd, &mut whole).unwrap(), count);
        assert_eq!(whole, &expected[offset..offset + count], "offset {offset}");

        // Same range as two adjacent reads split mid-way.
        let split = count / 2;
        let mut first = vec![0u8; split];
        let mut second = vec![0u8; count - split];
        table.seek(fd, offset as i32, Whence::Set).unwrap();
        table.read(&mut cd, fd, &mut first).unwrap();
        table.read(&mut cd, fd, &mut second).unwrap();
        first.extend_from_slice(&second);
        assert_eq!(first, whole);
    }
}

#[test]
fn read_advances_the_offset() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let fd = table
        .open(&mut cd, b"/USR/PONG/RES/BALL.BMP", O_RDONLY)
        .unwrap();

    let mut buf = [0u8; 100];
    table.read(&mut cd, fd, &mut buf).unwrap();
    assert_eq!(table.seek(fd, 0, Whence::Cur), Ok(100));
}

#[test]
fn read_at_eof_returns_zero_without_moving() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let fd = table
        .open(&mut cd, b"/USR/PONG/RES/BALL.BMP", O_RDONLY)
        .unwrap();

    assert_eq!(table.seek(fd, 0, Whence::End), Ok(BALL_SIZE));
    let mut buf = [0u8; 32];
    assert_eq!(table.read(&mut cd, fd, &mut buf).unwrap(), 0);
    assert_eq!(table.seek(fd, 0, Whence::Cur), Ok(BALL_SIZE));
}

#[test]
fn read_clamps_at_eof() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let fd = table
        .open(&mut cd, b"/USR/PONG/RES/BALL.BMP", O_RDONLY)
        .unwrap();

    table.seek(fd, -100, Whence::End).unwrap();
    let mut buf = [0u8; 1000];
    assert_eq!(table.read(&mut cd, fd, &mut buf).unwrap(), 100);
}

#[test]
fn seek_end_reports_the_file_size() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let fd = table
        .open(&mut cd, b"/usr/pong/res/ball.bmp", O_RDONLY)
        .unwrap();
    assert_eq!(table.seek(fd, 0, Whence::End), Ok(BALL_SIZE));
}

#[test]
fn seek_rejects_out_of_range_offsets() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let fd = table
        .open(&mut cd, b"/USR/PONG/RES/BALL.BMP", O_RDONLY)
        .unwrap();

    table.seek(fd, 10, Whence::Set).unwrap();
    assert_eq!(table.seek(fd, -1, Whence::Set), Err(FsError::BadOffset));
    assert_eq!(
        table.seek(fd, BALL_SIZE as i32 + 1, Whence::Set),
        Err(FsError::BadOffset)
    );
    assert_eq!(table.seek(fd, 1, Whence::End), Err(FsError::BadOffset));
    assert_eq!(table.seek(fd, -11, Whence::Cur), Err(FsError::BadOffset));
    // A failed seek leaves the offset unchanged.
    assert_eq!(table.seek(fd, 0, Whence::Cur), Ok(10));
}

#[test]
fn descriptor_table_has_sixteen_slots() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    for i in 0..MAX_FDS {
        assert_eq!(table.open(&mut cd, b"/HELLO.TXT", O_RDONLY), Ok(i));
    }
    assert_eq!(
        table.open(&mut cd, b"/HELLO.TXT", O_RDONLY),
        Err(FsError::TableFull)
    );

    table.close(7).unwrap();
    assert_eq!(table.open(&mut cd, b"/HELLO.TXT", O_RDONLY), Ok(7));
}

#[test]
fn bad_descriptors_are_rejected() {
    let mut cd = test_cd();
    let mut table = FdTable::new();
    let mut buf = [0u8; 8];

    assert_eq!(
        table.read(&mut cd, 0, &mut buf),
        Err(FsError::BadDescriptor)
    );
    assert_eq!(
        table.read(&mut cd, MAX_FDS, &mut buf),
        Err(FsError::BadDescriptor)
    );
    assert_eq!(table.close(3), Err(FsError::BadDescriptor));

    let fd = table.open(&mut cd, b"/HELLO.TXT", O_RDONLY).unwrap();
    table.close(fd).unwrap();
    assert_eq!(table.close(fd), Err(FsError::BadDescriptor));
}

#[test]
fn whence_decodes_posix_values() {
    assert_eq!(Whence::from_raw(0), Some(Whence::Set));
    assert_eq!(Whence::from_raw(1), Some(Whence::Cur));
    assert_eq!(Whence::from_raw(2), Some(Whence::End));
    assert_eq!(Whence::from_raw(3), None);
}

#[test]
fn device_errors_propagate_out_of_open() {
    // Image too short: the PVD read itself fails.
    let mut cd = RamCd::new(vec![0u8; CD_BLOCK_SIZE]);
    let mut table = FdTable::new();
    assert!(matches!(
        table.open(&mut cd, b"/HELLO.TXT", O_RDONLY),
        Err(FsError::Device(_))
    ));
}

/// ATAPI CD-ROM driver — SCSI READ(12) over ATA PIO.
///
/// Discovery probes both channels and both device selects for the ATAPI
/// signature; the first match wins and becomes the process-wide drive.
/// Reads go block-at-a-time: select, PACKET command, 12-byte CDB via the
/// data port, then 1024 data words back. The BSY/DRQ waits are named
/// polling predicates; none of them carries a timeout yet, so a wedged
/// drive wedges the kernel with it.
#[cfg(target_arch = "x86")]
use crate::fs::block::{Block, BlockDevice, CD_BLOCK_SIZE};
use bitflags::bitflags;
use core::fmt;
use spin::Mutex;

/// Primary channel I/O base and device control register.
pub const PRIMARY_IO: u16 = 0x1F0;
pub const PRIMARY_CONTROL: u16 = 0x3F6;
/// Secondary channel I/O base and device control register.
pub const SECONDARY_IO: u16 = 0x170;
pub const SECONDARY_CONTROL: u16 = 0x376;

// Register offsets from the channel I/O base.
const REG_DATA: u16 = 0;
const REG_FEATURES: u16 = 1;
const REG_SECTOR_COUNT: u16 = 2;
const REG_LBA_LOW: u16 = 3;
const REG_LBA_MID: u16 = 4;
const REG_LBA_HIGH: u16 = 5;
const REG_DRIVE: u16 = 6;
const REG_STATUS: u16 = 7;
const REG_COMMAND: u16 = 7;

// Device control register bits.
const SRST: u8 = 0x04;
const INTERRUPT_DISABLE: u8 = 0x02;

/// ATA PACKET command.
const CMD_PACKET: u8 = 0xA0;
/// SCSI READ(12) opcode, carried inside the packet.
const SCSI_READ_12: u8 = 0xA8;
/// Sector-count (interrupt reason) value once a packet command finished.
const PACKET_COMMAND_COMPLETE: u8 = 0x03;

/// Signature left in sector-count/LBA registers by an ATAPI device.
const ATAPI_SIGNATURE: [u8; 4] = [0x01, 0x01, 0x14, 0xEB];

bitflags! {
    /// ATA status register bits used by the polling predicates.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct AtaStatus: u8 {
        const ERR  = 0x01;
        const DRQ  = 0x08;
        const DRDY = 0x40;
        const BSY  = 0x80;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtapiError {
    /// No ATAPI drive was discovered.
    NoDrive,
    /// The device (or the mock standing in for it) rejected the read.
    MediaError,
}

impl fmt::Display for AtapiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtapiError::NoDrive => write!(f, "no ATAPI drive"),
            AtapiError::MediaError => write!(f, "media error"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Primary,
    Secondary,
}

impl Channel {
    pub fn io_base(self) -> u16 {
        match self {
            Channel::Primary => PRIMARY_IO,
            Channel::Secondary => SECONDARY_IO,
        }
    }

    pub fn control(self) -> u16 {
        match self {
            Channel::Primary => PRIMARY_CONTROL,
            Channel::Secondary => SECONDARY_CONTROL,
        }
    }
}

/// Drive-select byte written to the drive register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DriveSelect {
    Master = 0xA0,
    Slave = 0xB0,
}

/// The discovered drive: which channel, which select. Set once by
/// discovery, read by every subsequent PIO operation.
#[derive(Clone, Copy, Debug)]
pub struct AtapiDrive {
    channel: Channel,
    select: DriveSelect,
}

/// Process-wide drive record, filled in by discovery during boot.
pub static ATAPI_DRIVE: Mutex<Option<AtapiDrive>> = Mutex::new(None);

/// SCSI READ(12) command descriptor block: opcode, a 4-byte big-endian
/// LBA, a 4-byte big-endian transfer length, trailing reserved bytes.
#[repr(C, packed)]
pub struct ScsiPacket {
    op_code: u8,
    _reserved0: u8,
    lba_hi: u8,
    lba_mihi: u8,
    lba_milo: u8,
    lba_lo: u8,
    transfer_hi: u8,
    transfer_mihi: u8,
    transfer_milo: u8,
    transfer_lo: u8,
    _reserved1: u8,
    _control: u8,
}

static_assertions::const_assert_eq!(core::mem::size_of::<ScsiPacket>(), 12);

impl ScsiPacket {
    /// Build a READ(12) for `nb_blocks` blocks starting at `lba`.
    pub const fn read12(lba: u32, nb_blocks: u32) -> Self {
        Self {
            op_code: SCSI_READ_12,
            _reserved0: 0,
            lba_hi: ((lba >> 24) & 0xFF) as u8,
            lba_mihi: ((lba >> 16) & 0xFF) as u8,
            lba_milo: ((lba >> 8) & 0xFF) as u8,
            lba_lo: (lba & 0xFF) as u8,
            transfer_hi: ((nb_blocks >> 24) & 0xFF) as u8,
            transfer_mihi: ((nb_blocks >> 16) & 0xFF) as u8,
            transfer_milo: ((nb_blocks >> 8) & 0xFF) as u8,
            transfer_lo: (nb_blocks & 0xFF) as u8,
            _reserved1: 0,
            _control: 0,
        }
    }

    /// Wire form, ready to push out the data port word by word.
    pub const fn to_bytes(&self) -> [u8; 12] {
        [
            self.op_code,
            self._reserved0,
            self.lba_hi,
            self.lba_mihi,
            self.lba_milo,
            self.lba_lo,
            self.transfer_hi,
            self.transfer_mihi,
            self.transfer_milo,
            self.transfer_lo,
            self._reserved1,
            self._control,
        ]
    }
}

// ---- PIO plumbing (kernel target only) ----

/// Wait until BSY clears.
#[cfg(target_arch = "x86")]
fn wait_while_busy(io_base: u16) {
    use crate::arch::x86::inb;
    while AtaStatus::from_bits_truncate(inb(io_base + REG_STATUS)).contains(AtaStatus::BSY) {
        core::hint::spin_loop();
    }
}

/// Wait until DRQ is set.
#[cfg(target_arch = "x86")]
fn wait_for_data_request(io_base: u16) {
    use crate::arch::x86::inb;
    while !AtaStatus::from_bits_truncate(inb(io_base + REG_STATUS)).contains(AtaStatus::DRQ) {
        core::hint::spin_loop();
    }
}

/// Wait until the sector-count register reports the packet finished.
#[cfg(target_arch = "x86")]
fn wait_command_complete(io_base: u16) {
    use crate::arch::x86::inb;
    while inb(io_base + REG_SECTOR_COUNT) != PACKET_COMMAND_COMPLETE {
        core::hint::spin_loop();
    }
}

#[cfg(target_arch = "x86")]
impl AtapiDrive {
    /// Probe both channels and both selects for the ATAPI signature.
    /// First match wins.
    pub fn discover() -> Option<AtapiDrive> {
        use crate::arch::x86::outb;

        for channel in [Channel::Primary, Channel::Secondary] {
            // Software reset, then run with device interrupts off — the
            // driver polls.
            outb(channel.control(), SRST);
            outb(channel.control(), INTERRUPT_DISABLE);

            for select in [DriveSelect::Master, DriveSelect::Slave] {
                let drive = AtapiDrive { channel, select };
                drive.select_drive();
                if drive.read_signature() == ATAPI_SIGNATURE {
                    return Some(drive);
                }
            }
        }
        None
    }

    /// Write the select byte and wait for the drive to settle.
    fn select_drive(&self) {
        use crate::arch::x86::outb;
        let io_base = self.channel.io_base();
        outb(io_base + REG_DRIVE, self.select as u8);
        wait_while_busy(io_base);
    }

    fn read_signature(&self) -> [u8; 4] {
        use crate::arch::x86::inb;
        let io_base = self.channel.io_base();
        [
            inb(io_base + REG_SECTOR_COUNT),
            inb(io_base + REG_LBA_LOW),
            inb(io_base + REG_LBA_MID),
            inb(io_base + REG_LBA_HIGH),
        ]
    }

    /// Issue the PACKET command and push the CDB once the device asks
    /// for it.
    fn send_packet(&self, packet: &ScsiPacket) {
        use crate::arch::x86::{outb, outsw};
        let io_base = self.channel.io_base();

        wait_while_busy(io_base);

        outb(io_base + REG_FEATURES, 0); // PIO, no overlap, no DMA
        outb(io_base + REG_SECTOR_COUNT, 0); // no queuing

        // Expected per-DRQ byte count: one CD block.
        outb(io_base + REG_LBA_MID, (CD_BLOCK_SIZE & 0xFF) as u8);
        outb(io_base + REG_LBA_HIGH, ((CD_BLOCK_SIZE >> 8) & 0xFF) as u8);

        outb(io_base + REG_COMMAND, CMD_PACKET);

        wait_while_busy(io_base);
        wait_for_data_request(io_base);

        let bytes = packet.to_bytes();
        unsafe {
            outsw(io_base + REG_DATA, bytes.as_ptr() as *const u16, bytes.len() / 2);
        }
    }
}

#[cfg(target_arch = "x86")]
impl BlockDevice for AtapiDrive {
    fn read_block(&mut self, lba: u32) -> Result<Block, AtapiError> {
        use crate::arch::x86::insw;
        let io_base = self.channel.io_base();

        self.select_drive();
        self.send_packet(&ScsiPacket::read12(lba, 1));

        wait_command_complete(io_base);

        let mut block: Block = alloc::boxed::Box::new([0u8; CD_BLOCK_SIZE]);
        unsafe {
            insw(
                io_base + REG_DATA,
                block.as_mut_ptr() as *mut u16,
                CD_BLOCK_SIZE / 2,
            );
        }
        Ok(block)
    }
}

/// 8259A PIC (Programmable Interrupt Controller) — remap and acknowledge.
///
/// The legacy PIC maps IRQ 0-7 to vectors 8-15, which collides with CPU
/// exceptions. We remap IRQs to 32-47 and leave every line unmasked; the
/// timer and keyboard are serviced through the IRQ registry.
use super::{inb, outb};

const PIC1_CMD: u16 = 0x20;
const PIC1_DATA: u16 = 0x21;
const PIC2_CMD: u16 = 0xA0;
const PIC2_DATA: u16 = 0xA1;

const ICW1_INIT: u8 = 0x11; // initialization + ICW4 needed
const ICW4_8086: u8 = 0x01; // 8086 mode

const EOI: u8 = 0x20;

/// Vector the master PIC's IRQ 0 lands on after remap.
pub const IRQ_VECTOR_BASE: u8 = 32;

/// Remap the PIC so IRQs don't collide with CPU exceptions, then unmask
/// every line.
///
/// # Safety
/// Must be called during early boot, before `sti`.
pub unsafe fn init() {
    // ICW1: start initialization sequence
    outb(PIC1_CMD, ICW1_INIT);
    io_wait();
    outb(PIC2_CMD, ICW1_INIT);
    io_wait();

    // ICW2: vector offsets
    outb(PIC1_DATA, IRQ_VECTOR_BASE); // IRQ 0-7  → INT 32-39
    io_wait();
    outb(PIC2_DATA, IRQ_VECTOR_BASE + 8); // IRQ 8-15 → INT 40-47
    io_wait();

    // ICW3: tell PICs about each other
    outb(PIC1_DATA, 4); // slave on IRQ2
    io_wait();
    outb(PIC2_DATA, 2); // cascade identity
    io_wait();

    // ICW4: 8086 mode
    outb(PIC1_DATA, ICW4_8086);
    io_wait();
    outb(PIC2_DATA, ICW4_8086);
    io_wait();

    // Unmask every IRQ line
    outb(PIC1_DATA, 0x00);
    outb(PIC2_DATA, 0x00);
}

/// Acknowledge an IRQ: non-specific EOI to the master, and to the slave
/// first when the line came through the cascade.
pub fn end_of_interrupt(irq: u8) {
    if irq >= 8 {
        outb(PIC2_CMD, EOI);
    }
    outb(PIC1_CMD, EOI);
}

/// Small I/O delay between PIC initialization words.
fn io_wait() {
    // Writing to port 0x80 is a common way to add a small delay
    outb(0x80, 0);
}

// Keep inb imported for mask read-back during bring-up debugging.
#[allow(unused)]
fn read_masks() -> (u8, u8) {
    (inb(PIC1_DATA), inb(PIC2_DATA))
}

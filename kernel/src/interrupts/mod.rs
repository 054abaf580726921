/// Trap dispatch core.
///
/// The assembly stubs push the `Iregs` frame and call
/// `interrupt_dispatch`, which demuxes:
/// - vectors 0-31: CPU fault — log and halt, no recovery
/// - vectors 32-47: PIC IRQ — registered handler (if any), then EOI
/// - vector 128: syscall — number in eax, args in ebx/ecx/edx, result
///   written back into the frame's eax
/// - anything else: catch-all — log and halt
///
/// Interrupts stay disabled for the whole dispatch (interrupt gates), so
/// re-entry is impossible by construction.
pub mod irq;

use core::mem::size_of;

/// Saved-register frame pushed by the trap stubs, in push order from the
/// bottom of the frame. `useresp`/`ss` are only meaningful when the trap
/// crossed a ring boundary. The dispatcher may mutate `eax` to return a
/// syscall result.
#[repr(C)]
pub struct Iregs {
    pub cr2: u32,
    pub ds: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
    pub int_no: u32,
    pub err_code: u32,
    pub eip: u32,
    pub cs: u32,
    pub eflags: u32,
    pub useresp: u32,
    pub ss: u32,
}

static_assertions::const_assert_eq!(size_of::<Iregs>(), 68);

impl Iregs {
    /// An all-zero frame; handlers and tests fill in what they need.
    pub const fn zeroed() -> Self {
        Self {
            cr2: 0,
            ds: 0,
            edi: 0,
            esi: 0,
            ebp: 0,
            esp: 0,
            ebx: 0,
            edx: 0,
            ecx: 0,
            eax: 0,
            int_no: 0,
            err_code: 0,
            eip: 0,
            cs: 0,
            eflags: 0,
            useresp: 0,
            ss: 0,
        }
    }
}

/// CPU fault names, indexed by vector.
pub const EXCEPTION_NAMES: [&str; 32] = [
    "Division By Zero",
    "Debug",
    "Non Maskable Interrupt",
    "Breakpoint",
    "Into Detected Overflow",
    "Out of Bounds",
    "Invalid Opcode",
    "No Coprocessor",
    "Double Fault",
    "Coprocessor Segment Overrun",
    "Bad TSS",
    "Segment Not Present",
    "Stack Fault",
    "General Protection Fault",
    "Page Fault",
    "Unknown Interrupt",
    "Coprocessor Fault",
    "Alignment Check",
    "Machine Check",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
    "Reserved",
];

/// Central trap entry, called from the common assembly stub with the
/// frame the stub just pushed.
#[cfg(target_arch = "x86")]
#[no_mangle]
pub extern "C" fn interrupt_dispatch(frame: &mut Iregs) {
    use crate::arch::x86::idt::SYSCALL_VECTOR;

    match frame.int_no {
        0..=31 => fault(frame),
        32..=47 => {
            let line = (frame.int_no - 32) as u8;
            // Copy the handler out so it doesn't run under the registry
            // lock (a handler may install/uninstall).
            let handler = irq::IRQ_REGISTRY.lock().handler(line);
            if let Some(handler) = handler {
                handler(frame);
            }
            // Handler strictly before EOI: the line cannot re-fire until
            // its observable effects are committed.
            crate::arch::x86::pic::end_of_interrupt(line);
        }
        n if n as usize == SYSCALL_VECTOR => {
            crate::syscall::dispatch(frame, crate::syscall::table());
        }
        _ => {
            crate::serial_println!("Unhandled interrupt: {}", frame.int_no);
            crate::serial_println!("Processor halted!");
            halt_forever();
        }
    }
}

/// Fault path: log the vector name and error code, then halt for good.
#[cfg(target_arch = "x86")]
fn fault(frame: &Iregs) -> ! {
    crate::serial_println!("Received interrupt: {}", frame.int_no);
    crate::serial_println!("-> Exception: {}", EXCEPTION_NAMES[frame.int_no as usize]);
    crate::serial_println!("-> Error code: {}", frame.err_code);
    if frame.int_no == 14 {
        crate::serial_println!("-> Faulting address: {:#x}", frame.cr2);
    }
    crate::serial_println!("Processor halted!");
    halt_forever()
}

#[cfg(target_arch = "x86")]
fn halt_forever() -> ! {
    loop {
        crate::arch::x86::hlt();
    }
}

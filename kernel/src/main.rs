//! ReefOS kernel — entry point.
//!
//! Booted by a Multiboot loader (GRUB family). The loader enters protected
//! mode, loads the kernel at 1 MiB and jumps to `_start` (boot.S) with
//! eax = magic and ebx = &multiboot_info; `_start` sets up a stack and
//! calls `kernel_main`.
//!
//! The binary only builds for the kernel target; on the host this file
//! collapses to an empty `main` so `cargo test` can build the workspace.
#![cfg_attr(target_arch = "x86", no_std)]
#![cfg_attr(target_arch = "x86", no_main)]

#[cfg(target_arch = "x86")]
mod kernel_entry {
    use core::panic::PanicInfo;
    use reefos_kernel::arch::x86::{self, gdt, idt, pic, serial, vga};
    use reefos_kernel::drivers::{atapi, keyboard, timer};
    use reefos_kernel::serial_println;
    use reefos_kernel::{mem, syscall};

    /// Value the loader leaves in eax.
    const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;

    const MULTIBOOT_INFO_MEMORY: u32 = 1 << 0;
    const MULTIBOOT_INFO_MODS: u32 = 1 << 3;

    /// Leading fields of the multiboot info block — all this kernel
    /// consumes: the memory bounds (heap sizing) and the module list
    /// (the user ROM).
    #[repr(C)]
    struct MultibootInfo {
        flags: u32,
        mem_lower: u32,
        mem_upper: u32,
        boot_device: u32,
        cmdline: u32,
        mods_count: u32,
        mods_addr: u32,
    }

    #[repr(C)]
    struct MultibootModule {
        mod_start: u32,
        mod_end: u32,
        string: u32,
        _reserved: u32,
    }

    extern "C" {
        /// First byte past the kernel image (linker.ld).
        static __kernel_end: u8;
    }

    #[no_mangle]
    pub extern "C" fn kernel_main(magic: u32, info: *const MultibootInfo) -> ! {
        let info = unsafe { &*info };

        // Heap first: everything after this is allowed to allocate.
        init_heap(info);

        vga::init();
        stage("Framebuffer initialized");

        serial::SERIAL.lock().init();
        stage("Serial port initialized");

        if magic != MULTIBOOT_BOOTLOADER_MAGIC {
            fail("Bad multiboot magic");
        }
        serial_println!("[boot] multiboot info at {:p}, flags {:#x}", info, info.flags);

        unsafe { gdt::init() };
        stage("GDT loaded");
        stage("Protected mode enabled");

        unsafe { pic::init() };
        serial_println!("[cpu] PIC remapped to vectors 32-47, all IRQs unmasked");

        unsafe { idt::init() };
        stage("IDT loaded");

        syscall::init();
        stage("Syscalls initialized");

        timer::init();
        stage("Timer initialized");

        keyboard::init();
        stage("Keyboard initialized");

        match atapi::AtapiDrive::discover() {
            Some(drive) => {
                *atapi::ATAPI_DRIVE.lock() = Some(drive);
                stage("ATAPI drive found");
            }
            None => fail("ATAPI drive not found"),
        }

        x86::sti();
        stage("Setup finished!");

        run_user_rom(info);

        serial_println!("[boot] user ROM returned, halting");
        halt_forever();
    }

    /// One boot stage done: label on the text console, mirror on serial.
    fn stage(msg: &str) {
        vga::println(msg);
        serial_println!("[boot] {}", msg);
    }

    /// A boot stage failed: label it and halt.
    fn fail(msg: &str) -> ! {
        vga::println(msg);
        serial_println!("[boot] FATAL: {}", msg);
        halt_forever();
    }

    /// Give the global heap everything between the kernel image (or the
    /// last boot module, whichever ends higher) and the top of the memory
    /// the loader reported.
    fn init_heap(info: &MultibootInfo) {
        if info.flags & MULTIBOOT_INFO_MEMORY == 0 {
            fail("Multiboot memory info missing");
        }

        let mut heap_start = unsafe { core::ptr::addr_of!(__kernel_end) as usize };
        if info.flags & MULTIBOOT_INFO_MODS != 0 {
            let modules = unsafe {
                core::slice::from_raw_parts(
                    info.mods_addr as *const MultibootModule,
                    info.mods_count as usize,
                )
            };
            for module in modules {
                heap_start = heap_start.max(module.mod_end as usize);
            }
        }
        heap_start = (heap_start + 0xFFF) & !0xFFF;

        // mem_upper counts KiB above the 1 MiB mark.
        let memory_top = 0x0010_0000 + info.mem_upper as usize * 1024;
        if memory_top <= heap_start {
            fail("No memory left for the kernel heap");
        }

        mem::init(heap_start, memory_top - heap_start);
    }

    /// Yield to the user ROM: the first multiboot module, entered at its
    /// load address. When no ROM is present (or it returns) the caller
    /// halts the CPU.
    fn run_user_rom(info: &MultibootInfo) {
        if info.flags & MULTIBOOT_INFO_MODS == 0 || info.mods_count == 0 {
            serial_println!("[boot] no user ROM module, idling");
            return;
        }

        let module = unsafe { &*(info.mods_addr as *const MultibootModule) };
        serial_println!(
            "[boot] entering user ROM at {:#x} ({} bytes)",
            module.mod_start,
            module.mod_end - module.mod_start
        );

        let entry: extern "C" fn() = unsafe { core::mem::transmute(module.mod_start as usize) };
        entry();
    }

    fn halt_forever() -> ! {
        loop {
            x86::hlt();
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        serial_println!("!!! KERNEL PANIC !!!");
        serial_println!("{}", info);
        vga::println("KERNEL PANIC");
        halt_forever();
    }
}

#[cfg(not(target_arch = "x86"))]
fn main() {}

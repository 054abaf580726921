/// ReefOS kernel build script.
///
/// Assembles the multiboot entry stub and the interrupt vector stubs as a
/// static library linked into the kernel, and points the linker at the
/// kernel layout script.
fn main() {
    // Skip assembly when building for the host target (unit tests).
    // The unit tests only exercise pure Rust logic (descriptor encoding,
    // ISO 9660 parsing, the fd table, the scancode state machine) and don't
    // need the boot stub or the trap stubs.
    let target = std::env::var("TARGET").unwrap_or_default();
    if !target.contains("reefos") {
        // Host target (e.g., x86_64-unknown-linux-gnu) — skip bare-metal asm.
        return;
    }

    // Flags for bare-metal 32-bit kernel code. -fno-pic matters: the cc
    // crate may default to PIC, but the kernel is linked at a fixed 1 MiB
    // load address.
    let common_flags: &[&str] = &[
        "-m32",
        "-ffreestanding",
        "-nostdlib",
        "-fno-stack-protector",
        "-fno-pic",
        "-fno-pie",
    ];

    let mut asm = cc::Build::new();
    asm.file("src/arch/x86/boot.S")
        .file("src/arch/x86/trap.S")
        // The custom kernel target has no matching cross toolchain; the
        // host gcc with -m32 assembles these fine.
        .compiler("gcc")
        .target("i686-unknown-linux-gnu")
        .pic(false);
    for flag in common_flags {
        asm.flag(flag);
    }
    asm.compile("reefos_entry");

    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    println!("cargo:rustc-link-arg-bins=-T{manifest_dir}/linker.ld");

    println!("cargo:rerun-if-changed=src/arch/x86/boot.S");
    println!("cargo:rerun-if-changed=src/arch/x86/trap.S");
    println!("cargo:rerun-if-changed=linker.ld");
}

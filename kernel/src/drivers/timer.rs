/// PIT timer — IRQ 0 at 100 Hz.
///
/// Channel 0 runs in mode 2 ("rate generator"); the IRQ handler just bumps
/// a tick counter. The read side is a single aligned 32-bit load, so
/// `tick_count` is atomic on this machine by construction.
#[cfg(target_arch = "x86")]
use crate::interrupts::irq::IRQ_REGISTRY;
use crate::interrupts::Iregs;
use core::sync::atomic::{AtomicU32, Ordering};

/// PIT input clock, Hz (standard PC).
pub const PIT_FREQUENCY_HZ: u32 = 1_193_182;

/// Tick rate the kernel runs at.
pub const TICK_RATE_HZ: u32 = 100;

/// Channel-0 divisor for 100 Hz (1193182 / 100, rounded).
const PIT_DIVISOR: u16 = 11_932;

const PIT_CHANNEL0: u16 = 0x40;
const PIT_COMMAND: u16 = 0x43;

/// Command byte: channel 0, lobyte/hibyte access, mode 2, binary.
const PIT_CONFIG: u8 = 0x34;

static TICKS: AtomicU32 = AtomicU32::new(0);

/// Ticks since `init` (10 ms each at 100 Hz).
pub fn tick_count() -> u32 {
    TICKS.load(Ordering::Relaxed)
}

/// IRQ 0 handler.
fn on_irq0(_frame: &mut Iregs) {
    TICKS.fetch_add(1, Ordering::Relaxed);
}

/// Install the IRQ 0 handler and program channel 0 for 100 Hz.
#[cfg(target_arch = "x86")]
pub fn init() {
    use crate::arch::x86::outb;

    TICKS.store(0, Ordering::Relaxed);
    IRQ_REGISTRY.lock().install(0, on_irq0);

    outb(PIT_COMMAND, PIT_CONFIG);
    outb(PIT_CHANNEL0, (PIT_DIVISOR & 0xFF) as u8);
    outb(PIT_CHANNEL0, (PIT_DIVISOR >> 8) as u8);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq0_increments_ticks() {
        let before = tick_count();
        let mut frame = Iregs::zeroed();
        on_irq0(&mut frame);
        on_irq0(&mut frame);
        assert_eq!(tick_count(), before + 2);
    }
}

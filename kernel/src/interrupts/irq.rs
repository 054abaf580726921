/// IRQ registry — maps the 16 PIC lines to handler functions.
///
/// Registration happens before `sti` and handlers run with interrupts
/// disabled, so a spin lock is plenty.
use super::Iregs;
use spin::Mutex;

pub const NB_IRQS: usize = 16;

/// Handler ABI: receives the trap frame by reference. Plain function
/// pointers — no allocation anywhere near the IRQ path.
pub type IrqHandler = fn(&mut Iregs);

pub struct IrqRegistry {
    slots: [Option<IrqHandler>; NB_IRQS],
}

impl IrqRegistry {
    pub const fn new() -> Self {
        Self {
            slots: [None; NB_IRQS],
        }
    }

    /// Install `handler` for `line`. Out-of-range lines are ignored.
    pub fn install(&mut self, line: u8, handler: IrqHandler) {
        if let Some(slot) = self.slots.get_mut(line as usize) {
            *slot = Some(handler);
        }
    }

    /// Clear the handler for `line`.
    pub fn uninstall(&mut self, line: u8) {
        if let Some(slot) = self.slots.get_mut(line as usize) {
            *slot = None;
        }
    }

    /// The handler currently installed for `line`, if any.
    pub fn handler(&self, line: u8) -> Option<IrqHandler> {
        self.slots.get(line as usize).copied().flatten()
    }
}

pub static IRQ_REGISTRY: Mutex<IrqRegistry> = Mutex::new(IrqRegistry::new());

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    static FIRED: AtomicUsize = AtomicUsize::new(0);

    fn counting_handler(_frame: &mut Iregs) {
        FIRED.fetch_add(1, Ordering::Relaxed);
    }

    /// Simulate a raised edge on `line` the way the dispatcher does:
    /// look up, then invoke.
    fn raise(registry: &IrqRegistry, line: u8) {
        let mut frame = Iregs::zeroed();
        frame.int_no = 32 + line as u32;
        if let Some(handler) = registry.handler(line) {
            handler(&mut frame);
        }
    }

    #[test]
    fn handler_fires_between_install_and_uninstall_only() {
        let mut registry = IrqRegistry::new();
        FIRED.store(0, Ordering::Relaxed);

        raise(&registry, 3);
        assert_eq!(FIRED.load(Ordering::Relaxed), 0);

        registry.install(3, counting_handler);
        raise(&registry, 3);
        raise(&registry, 3);
        assert_eq!(FIRED.load(Ordering::Relaxed), 2);

        registry.uninstall(3);
        raise(&registry, 3);
        assert_eq!(FIRED.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn lines_are_independent() {
        let mut registry = IrqRegistry::new();
        registry.install(0, counting_handler);
        assert!(registry.handler(0).is_some());
        assert!(registry.handler(1).is_none());
        registry.uninstall(0);
        assert!(registry.handler(0).is_none());
    }

    #[test]
    fn out_of_range_lines_are_ignored() {
        let mut registry = IrqRegistry::new();
        registry.install(200, counting_handler);
        assert!(registry.handler(200).is_none());
    }
}

mod heap;

pub use heap::FreeListAllocator;

#[cfg(target_arch = "x86")]
pub use heap::{init, HEAP};

/// VGA console — boot-stage labels on the 80×25 text buffer, plus the
/// minimal mode surface backing the `setvideo`/`swap_frontbuffer`
/// syscalls.
use spin::Mutex;

const TEXT_BUFFER: usize = 0xB8000;
const GRAPHICS_BUFFER: usize = 0xA0000;

const ROWS: usize = 25;
const COLS: usize = 80;

/// Light grey on black.
const ATTR: u8 = 0x07;

/// 320×200, one byte per pixel.
pub const GRAPHICS_FRAME_BYTES: usize = 320 * 200;

/// Video modes understood by `setvideo`.
pub const MODE_TEXT: u32 = 0;
pub const MODE_GRAPHICS: u32 = 1;

pub static CONSOLE: Mutex<Console> = Mutex::new(Console::new());

pub struct Console {
    row: usize,
    col: usize,
    mode: u32,
}

impl Console {
    pub const fn new() -> Self {
        Self { row: 0, col: 0, mode: MODE_TEXT }
    }

    fn cell_ptr(row: usize, col: usize) -> *mut u8 {
        (TEXT_BUFFER + 2 * (row * COLS + col)) as *mut u8
    }

    pub fn clear(&mut self) {
        for row in 0..ROWS {
            for col in 0..COLS {
                Self::write_cell(row, col, b' ');
            }
        }
        self.row = 0;
        self.col = 0;
    }

    fn write_cell(row: usize, col: usize, byte: u8) {
        let ptr = Self::cell_ptr(row, col);
        unsafe {
            core::ptr::write_volatile(ptr, byte);
            core::ptr::write_volatile(ptr.add(1), ATTR);
        }
    }

    fn newline(&mut self) {
        self.col = 0;
        if self.row + 1 < ROWS {
            self.row += 1;
        } else {
            self.scroll();
        }
    }

    /// Shift every row up by one and blank the last.
    fn scroll(&mut self) {
        for row in 1..ROWS {
            for col in 0..COLS {
                let src = Self::cell_ptr(row, col);
                let dst = Self::cell_ptr(row - 1, col);
                unsafe {
                    let ch = core::ptr::read_volatile(src);
                    core::ptr::write_volatile(dst, ch);
                }
            }
        }
        for col in 0..COLS {
            Self::write_cell(ROWS - 1, col, b' ');
        }
    }

    pub fn put_byte(&mut self, byte: u8) {
        match byte {
            b'\n' => self.newline(),
            _ => {
                Self::write_cell(self.row, self.col, byte);
                self.col += 1;
                if self.col == COLS {
                    self.newline();
                }
            }
        }
    }

    pub fn write_str(&mut self, s: &str) {
        for byte in s.bytes() {
            self.put_byte(byte);
        }
    }
}

/// Clear the text buffer and home the cursor.
pub fn init() {
    CONSOLE.lock().clear();
}

/// Write one line to the text console.
pub fn println(msg: &str) {
    let mut console = CONSOLE.lock();
    console.write_str(msg);
    console.put_byte(b'\n');
}

/// Select the video mode. The full mode-setting register dance lives with
/// the graphics driver; the kernel core only tracks which framebuffer
/// `swap_frontbuffer` targets.
pub fn set_mode(mode: u32) -> Result<(), ()> {
    match mode {
        MODE_TEXT | MODE_GRAPHICS => {
            CONSOLE.lock().mode = mode;
            Ok(())
        }
        _ => Err(()),
    }
}

/// Copy a caller-drawn frame into the active framebuffer. Only meaningful
/// in graphics mode.
pub fn swap_frontbuffer(frame: &[u8]) -> Result<(), ()> {
    if CONSOLE.lock().mode != MODE_GRAPHICS {
        return Err(());
    }
    let len = frame.len().min(GRAPHICS_FRAME_BYTES);
    let dst = GRAPHICS_BUFFER as *mut u8;
    unsafe {
        core::ptr::copy_nonoverlapping(frame.as_ptr(), dst, len);
    }
    Ok(())
}

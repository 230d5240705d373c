//! Top-level application controller.
//!
//! Owns program-mode selection, menu navigation and the Info screen, and
//! translates confirmed key presses into capture-core requests. Key
//! handling only reconfigures state; all drawing happens afterwards in
//! [`App::render`], so a slow display can never delay input.

use core::slice;

use crate::capture::types::{AddressFilter, CaptureProgram, CapturedEvent};
use crate::keypad::Keys;
use crate::ui::scroll::{ScrollStage, TextScroller};
use crate::ui::Renderer;

/// The available programs, in menu order plus the menu itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramSelect {
    MainMenu,
    /// The classic POST port.
    Port80Reader,
    /// IBM PS/2s output to 90h.
    Port90Reader,
    /// Early Compaqs output to 84h.
    Port84Reader,
    /// Some EISA systems output to 300h.
    Port300Reader,
    /// Olivettis output to 378h.
    Port378Reader,
    /// Forward every I/O write, serial only.
    BusDump,
    VoltageMonitor,
    Info,
    UpdateFirmware,
}

impl ProgramSelect {
    /// The capture-core program backing this mode, if any.
    pub fn capture_program(self) -> Option<CaptureProgram> {
        match self {
            ProgramSelect::Port80Reader => {
                Some(CaptureProgram::Reader(AddressFilter::Only(0x0080)))
            }
            ProgramSelect::Port90Reader => {
                Some(CaptureProgram::Reader(AddressFilter::Only(0x0090)))
            }
            ProgramSelect::Port84Reader => {
                Some(CaptureProgram::Reader(AddressFilter::Only(0x0084)))
            }
            ProgramSelect::Port300Reader => {
                Some(CaptureProgram::Reader(AddressFilter::Only(0x0300)))
            }
            ProgramSelect::Port378Reader => {
                Some(CaptureProgram::Reader(AddressFilter::Only(0x0378)))
            }
            ProgramSelect::BusDump => Some(CaptureProgram::Reader(AddressFilter::All)),
            ProgramSelect::VoltageMonitor => Some(CaptureProgram::VoltageMonitor),
            _ => None,
        }
    }
}

/// Menu entries in display order.
pub const MENU: &[(ProgramSelect, &str)] = &[
    (ProgramSelect::Port80Reader, "Port 80h"),
    (ProgramSelect::Port90Reader, "Port 90h (PS/2)"),
    (ProgramSelect::Port84Reader, "Port 84h (Compaq)"),
    (ProgramSelect::Port300Reader, "Port 300h (EISA)"),
    (ProgramSelect::Port378Reader, "Port 378h (LPT)"),
    (ProgramSelect::BusDump, "Bus dump"),
    (ProgramSelect::VoltageMonitor, "Voltage rails"),
    (ProgramSelect::Info, "Info"),
    (ProgramSelect::UpdateFirmware, "Update firmware"),
];

fn menu_label(select: ProgramSelect) -> &'static str {
    MENU.iter()
        .find(|(entry, _)| *entry == select)
        .map(|(_, label)| *label)
        .unwrap_or("")
}

/// Side effects the async shell has to carry out on behalf of the
/// controller (starting/stopping capture-core programs, rebooting).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppRequest {
    Start(CaptureProgram),
    /// Stop the active session and synchronously drain residual events.
    StopAndDrain,
    /// Hand control to the ROM USB bootloader. Terminal.
    EnterBootloader,
}

pub struct App {
    current: ProgramSelect,
    pending: ProgramSelect,
    /// Cursor as drawn.
    menu_idx: usize,
    /// Cursor as requested by Up/Down.
    new_menu_idx: usize,
    menu_drawn: bool,
    scroller: TextScroller,
    header_drawn: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            current: ProgramSelect::MainMenu,
            pending: ProgramSelect::MainMenu,
            menu_idx: 0,
            new_menu_idx: 0,
            menu_drawn: false,
            scroller: TextScroller::new(),
            header_drawn: false,
        }
    }

    pub fn current(&self) -> ProgramSelect {
        self.current
    }

    pub fn in_main_menu(&self) -> bool {
        self.current == ProgramSelect::MainMenu
    }

    pub fn menu_index(&self) -> usize {
        self.menu_idx
    }

    /// Force a redraw of the current screen (after waking from standby).
    pub fn force_redraw(&mut self) {
        self.menu_drawn = false;
    }

    /// Apply one confirmed key set. Returns the side effect the shell must
    /// perform, if any. Does not draw.
    pub fn handle_key(&mut self, keys: Keys) -> Option<AppRequest> {
        match self.current {
            ProgramSelect::MainMenu => {
                if keys.contains(Keys::DOWN) && self.new_menu_idx < MENU.len() - 1 {
                    self.new_menu_idx += 1;
                } else if keys.contains(Keys::UP) && self.new_menu_idx > 0 {
                    self.new_menu_idx -= 1;
                } else if keys.contains(Keys::SELECT) {
                    let (select, _) = MENU[self.menu_idx];
                    self.pending = select;
                    if select == ProgramSelect::Info {
                        self.scroller.set_stage(ScrollStage::DrawBitmap);
                    } else {
                        self.scroller.set_stage(ScrollStage::DrawHeader);
                    }
                    return select.capture_program().map(AppRequest::Start);
                }
                None
            }

            ProgramSelect::Info => {
                if keys.contains(Keys::BACK) {
                    self.back_to_menu();
                } else if keys.contains(Keys::DOWN) {
                    if self.scroller.stage() == ScrollStage::BitmapShown {
                        self.scroller.set_stage(ScrollStage::DrawHeader);
                    }
                } else if keys.contains(Keys::UP)
                    && self.scroller.stage() != ScrollStage::BitmapShown
                {
                    self.scroller.set_stage(ScrollStage::DrawBitmap);
                }
                None
            }

            ProgramSelect::UpdateFirmware => None,

            // A running reader/monitor mode.
            _ => {
                if keys.contains(Keys::BACK) {
                    self.back_to_menu();
                    return Some(AppRequest::StopAndDrain);
                }
                None
            }
        }
    }

    fn back_to_menu(&mut self) {
        self.pending = ProgramSelect::MainMenu;
        // Cursor comes back where the user left it.
        self.new_menu_idx = self.menu_idx;
        self.menu_drawn = false;
    }

    /// Render pass: commit a pending mode switch and draw whatever the
    /// current mode needs. Returns a request only for terminal modes.
    pub fn render<R: Renderer>(&mut self, renderer: &mut R, now_us: u64) -> Option<AppRequest> {
        if self.pending != self.current {
            renderer.clear_screen();
            self.current = self.pending;
            self.menu_drawn = false;
            self.header_drawn = false;
        }

        match self.current {
            ProgramSelect::MainMenu => {
                if !self.menu_drawn || self.new_menu_idx != self.menu_idx {
                    self.menu_idx = self.new_menu_idx;
                    renderer.draw_menu(self.menu_idx);
                    self.menu_drawn = true;
                }
                None
            }

            ProgramSelect::Info => {
                match self.scroller.stage() {
                    ScrollStage::DrawBitmap => {
                        renderer.draw_splash();
                        self.scroller.bitmap_done();
                    }
                    ScrollStage::DrawHeader => {
                        renderer.draw_header(concat!("postprobe ", env!("CARGO_PKG_VERSION")));
                        self.scroller.start_text();
                    }
                    _ => {
                        if let Some(window) = self.scroller.step(now_us) {
                            renderer.draw_footer(window.text());
                        }
                    }
                }
                None
            }

            ProgramSelect::UpdateFirmware => {
                renderer.draw_header(menu_label(self.current));
                renderer.draw_footer("Connect to PC");
                Some(AppRequest::EnterBootloader)
            }

            _ => {
                if !self.header_drawn {
                    renderer.draw_header(menu_label(self.current));
                    self.header_drawn = true;
                }
                None
            }
        }
    }

    /// Forward one captured event to the renderer.
    pub fn handle_event<R: Renderer>(&mut self, renderer: &mut R, event: &CapturedEvent) {
        renderer.new_data(slice::from_ref(event));
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

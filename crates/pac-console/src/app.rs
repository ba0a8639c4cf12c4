use crate::grid::{GridGeometry, Placement};
use crate::locale::Strings;
use crate::session::Session;
use crate::theme::Palette;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, MouseEvent, MouseEventKind};
use pac_core::{ArrayElement, ElementId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dashboard,
    Grid,
    Jobs,
}

impl Mode {
    pub fn title(self, strings: &Strings) -> &'static str {
        match self {
            Mode::Dashboard => strings.mode_dashboard,
            Mode::Grid => strings.mode_grid,
            Mode::Jobs => strings.mode_jobs,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Mode::Dashboard => Mode::Grid,
            Mode::Grid => Mode::Jobs,
            Mode::Jobs => Mode::Dashboard,
        }
    }
}

/// Grid as last drawn; mouse hit-testing runs against it.
#[derive(Debug, Clone)]
pub struct GridView {
    pub geometry: GridGeometry,
    pub placement: Placement,
}

pub struct App {
    pub mode: Mode,
    pub help_open: bool,
    pub status_note: Option<String>,
    pub strings: &'static Strings,
    pub palette: Palette,
    pub session: Session,
    pub pointer: Option<(u16, u16)>,
    pub hovered: Option<ElementId>,
    pub cursor: Option<(usize, usize)>,
    pub jobs_scroll: usize,
    grid: Option<GridView>,
}

impl App {
    pub fn new(session: Session, strings: &'static Strings, palette: Palette) -> Self {
        Self {
            mode: Mode::Dashboard,
            help_open: false,
            status_note: None,
            strings,
            palette,
            session,
            pointer: None,
            hovered: None,
            cursor: None,
            jobs_scroll: 0,
            grid: None,
        }
    }

    /// Replace the laid-out grid and re-resolve the hover target, since the
    /// cell under a resting pointer changes on resize or reload.
    pub fn set_grid_view(&mut self, view: Option<GridView>) {
        self.grid = view;
        self.hovered = self
            .pointer
            .and_then(|(column, row)| self.element_under(column, row));
    }

    pub fn grid_view(&self) -> Option<&GridView> {
        self.grid.as_ref()
    }

    pub fn hovered_element(&self) -> Option<&ArrayElement> {
        self.session.state().store().element(self.hovered?)
    }

    pub fn cursor_element(&self) -> Option<&ArrayElement> {
        let (col, row) = self.cursor?;
        let view = self.grid_view()?;
        let index = view.placement.element_at(col, row)?;
        self.session.state().store().elements().get(index)
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.hovered = None;
        self.pointer = None;
    }

    /// Returns true when the console should quit.
    pub fn handle_input(&mut self, event: Event) -> bool {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse);
                false
            }
            _ => false,
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::F(1)) {
            self.help_open = !self.help_open;
            return false;
        }
        if key.code == KeyCode::Esc && self.help_open {
            self.help_open = false;
            return false;
        }
        if self.help_open {
            return false;
        }

        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('1') => self.set_mode(Mode::Dashboard),
            KeyCode::Char('2') => self.set_mode(Mode::Grid),
            KeyCode::Char('3') => self.set_mode(Mode::Jobs),
            KeyCode::Tab => self.set_mode(self.mode.next()),
            KeyCode::Char('r') => {
                self.session.reload();
                self.status_note = Some(self.strings.note_reloading.to_string());
            }
            KeyCode::Char('c') => {
                self.session.reconnect();
                self.status_note = Some(self.strings.note_reconnecting.to_string());
            }
            KeyCode::Esc => self.cursor = None,
            KeyCode::Left | KeyCode::Char('h') => self.move_cursor(-1, 0),
            KeyCode::Right | KeyCode::Char('l') => self.move_cursor(1, 0),
            KeyCode::Up | KeyCode::Char('k') => {
                if self.mode == Mode::Jobs {
                    self.jobs_scroll = self.jobs_scroll.saturating_sub(1);
                } else {
                    self.move_cursor(0, -1);
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.mode == Mode::Jobs {
                    let max = self.session.state().store().jobs().len().saturating_sub(1);
                    self.jobs_scroll = (self.jobs_scroll + 1).min(max);
                } else {
                    self.move_cursor(0, 1);
                }
            }
            _ => {}
        }
        false
    }

    fn move_cursor(&mut self, dx: isize, dy: isize) {
        if self.mode != Mode::Grid {
            return;
        }
        let cols = match &self.grid {
            Some(view) => view.placement.cols,
            None => return,
        };
        let (col, row) = self.cursor.unwrap_or((0, 0));
        let step = |value: usize, delta: isize| -> usize {
            value.saturating_add_signed(delta).min(cols.saturating_sub(1))
        };
        self.cursor = Some(if self.cursor.is_none() {
            (0, 0)
        } else {
            (step(col, dx), step(row, dy))
        });
    }

    pub fn handle_mouse(&mut self, event: MouseEvent) {
        if event.kind != MouseEventKind::Moved {
            return;
        }
        if self.mode != Mode::Grid {
            self.pointer = None;
            self.hovered = None;
            return;
        }
        self.pointer = Some((event.column, event.row));
        self.hovered = self.element_under(event.column, event.row);
    }

    fn element_under(&self, column: u16, row: u16) -> Option<ElementId> {
        let view = self.grid_view()?;
        let (col, line) = view.geometry.cell_at(column, row)?;
        let index = view.placement.element_at(col, line)?;
        self.session
            .state()
            .store()
            .elements()
            .get(index)
            .map(|element| element.id)
    }
}

use crate::app::{App, GridView, Mode};
use crate::grid::{self, GridFit, Placement};
use crate::locale::Strings;
use crate::theme::Palette;
use chrono::{DateTime, Local, NaiveDateTime};
use pac_client::{ConnectionStatus, ResourceHealth};
use pac_core::{ApplyOutcome, ArrayElement, ElementStatus, Job, JobStatus};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

const RAMP_STEPS: usize = 32;
const OVERLAY_WIDTH: u16 = 30;

pub fn render_ui(frame: &mut Frame, app: &mut App) {
    let size = frame.size();
    let theme = app.palette;
    let banner = app.session.state().status() != ConnectionStatus::Open;
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Length(if banner { 1 } else { 0 }),
            Constraint::Min(0),
        ])
        .split(size);
    frame.render_widget(render_header(app, theme, size.width), layout[0]);
    if banner {
        frame.render_widget(render_banner(app, theme), layout[1]);
    }
    match app.mode {
        Mode::Dashboard => {
            app.set_grid_view(None);
            render_dashboard(frame, app, theme, layout[2]);
        }
        Mode::Grid => render_grid_panel(frame, app, theme, layout[2]),
        Mode::Jobs => {
            app.set_grid_view(None);
            render_jobs(frame, app, theme, layout[2]);
        }
    }
    if app.mode == Mode::Grid {
        render_hover_overlay(frame, app, theme);
    }
    if app.help_open {
        render_help_overlay(frame, app.strings, theme);
    }
}

fn panel<'a>(title: &'a str, theme: Palette) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.border))
        .style(Style::default().bg(theme.surface))
        .title(Span::styled(
            title,
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        ))
}

fn render_header<'a>(app: &'a App, theme: Palette, width: u16) -> Paragraph<'a> {
    let strings = app.strings;
    let state = app.session.state();
    let inner_width = width.saturating_sub(4) as usize;
    let snapshot = match (state.loaded_at(), state.is_reloading()) {
        (_, true) if state.held_events() > 0 => {
            format!("{} (+{})", strings.data_loading, state.held_events())
        }
        (_, true) | (None, false) => strings.data_loading.to_string(),
        (Some(at), false) => at.format("%H:%M:%S").to_string(),
    };
    let fields = vec![
        format!("[{}]", app.mode.title(strings)),
        format!("{}: {}", strings.stream, status_label(strings, state.status())),
        format!("API: {}", app.session.api_base()),
        format!("Snapshot: {snapshot}"),
    ];
    let status_line = fit_fields(&fields, inner_width.max(12));
    let note = app.status_note.as_deref().unwrap_or(strings.note_ready);
    let note_color = if app.status_note.is_some() {
        theme.accent
    } else {
        theme.muted
    };

    Paragraph::new(Text::from(vec![
        Line::from(Span::styled(status_line, Style::default().fg(theme.text))),
        Line::from(Span::styled(
            ellipsize(note, inner_width.max(12)),
            Style::default().fg(note_color),
        )),
    ]))
    .style(Style::default().fg(theme.text).bg(theme.bg))
    .block(panel(strings.app_title, theme).style(Style::default().bg(theme.bg)))
}

fn render_banner<'a>(app: &'a App, theme: Palette) -> Paragraph<'a> {
    let status = app.session.state().status();
    let color = match status {
        ConnectionStatus::Error => theme.critical,
        _ => theme.warn,
    };
    Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", status_label(app.strings, status)),
            Style::default()
                .fg(theme.bg)
                .bg(color)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(app.strings.banner_offline, Style::default().fg(color)),
    ]))
    .style(Style::default().bg(theme.bg))
}

fn status_label(strings: &Strings, status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Closed => strings.conn_closed,
        ConnectionStatus::Connecting => strings.conn_connecting,
        ConnectionStatus::Open => strings.conn_open,
        ConnectionStatus::Error => strings.conn_error,
    }
}

fn status_color(status: ConnectionStatus, theme: Palette) -> Color {
    match status {
        ConnectionStatus::Open => theme.ok,
        ConnectionStatus::Connecting => theme.warn,
        ConnectionStatus::Closed => theme.muted,
        ConnectionStatus::Error => theme.critical,
    }
}

fn job_status_color(status: JobStatus, theme: Palette) -> Color {
    match status {
        JobStatus::Pending => theme.warn,
        JobStatus::Running => theme.accent,
        JobStatus::Completed => theme.ok,
        JobStatus::Failed => theme.critical,
    }
}

fn element_status_color(status: ElementStatus, theme: Palette) -> Color {
    match status {
        ElementStatus::Idle => theme.muted,
        ElementStatus::Active => theme.ok,
        ElementStatus::Fault => theme.critical,
    }
}

/// Text for a resource whose collection is empty or unreadable.
fn health_note(
    strings: &Strings,
    health: &ResourceHealth,
    reloading: bool,
    theme: Palette,
) -> Option<Span<'static>> {
    match health {
        ResourceHealth::Failed(reason) => Some(Span::styled(
            format!("{} ({reason})", strings.data_failed),
            Style::default().fg(theme.critical),
        )),
        ResourceHealth::Empty => Some(Span::styled(
            strings.data_empty,
            Style::default().fg(theme.muted),
        )),
        ResourceHealth::NotRequested if reloading => Some(Span::styled(
            strings.data_loading,
            Style::default().fg(theme.muted),
        )),
        ResourceHealth::NotRequested | ResourceHealth::Loaded(_) => None,
    }
}

fn render_dashboard(frame: &mut Frame, app: &App, theme: Palette, area: Rect) {
    let strings = app.strings;
    let state = app.session.state();
    let store = state.store();
    let counts = store.counts();
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let label = |text: &'static str| {
        Span::styled(
            text,
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )
    };
    let mut lines = vec![Line::from(vec![
        label(strings.kpi_jobs),
        Span::styled(
            format!("  {}", store.jobs().len()),
            Style::default().fg(theme.text),
        ),
    ])];
    if let Some(note) = health_note(strings, &state.health().jobs, state.is_reloading(), theme)
    {
        lines.push(Line::from(vec![Span::raw("  "), note]));
    }
    for status in JobStatus::ALL {
        let count = counts.jobs_in(status);
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:<12}", strings.job_status(status)),
                Style::default().fg(job_status_color(status, theme)),
            ),
            Span::styled(count.to_string(), Style::default().fg(theme.text)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        label(strings.kpi_elements),
        Span::styled(
            format!("  {}", store.elements().len()),
            Style::default().fg(theme.text),
        ),
    ]));
    if let Some(note) = health_note(
        strings,
        &state.health().elements,
        state.is_reloading(),
        theme,
    ) {
        lines.push(Line::from(vec![Span::raw("  "), note]));
    }
    for status in ElementStatus::ALL {
        let count = counts.elements_in(status);
        lines.push(Line::from(vec![
            Span::styled(
                format!("  {:<12}", strings.element_status(status)),
                Style::default().fg(element_status_color(status, theme)),
            ),
            Span::styled(count.to_string(), Style::default().fg(theme.text)),
        ]));
    }
    let mean = store
        .mean_active_amplitude()
        .map(|value| format!("{value:.1}"))
        .unwrap_or_else(|| "-".to_string());
    lines.push(Line::from(vec![
        Span::styled(
            format!("  {}: ", strings.kpi_mean_amplitude),
            Style::default().fg(theme.muted),
        ),
        Span::styled(mean, Style::default().fg(theme.text)),
    ]));
    lines.push(Line::from(""));
    let status = state.status();
    lines.push(Line::from(vec![
        label(strings.stream),
        Span::styled(
            format!("  {}", status_label(strings, status)),
            Style::default().fg(status_color(status, theme)),
        ),
    ]));
    let generation = state
        .live_generation()
        .map(|generation| format!(" #{generation}"))
        .unwrap_or_default();
    lines.push(Line::from(Span::styled(
        format!("  {}{generation}", app.session.stream_url()),
        Style::default().fg(theme.muted),
    )));
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel(strings.kpi_title, theme)),
        columns[0],
    );

    let mut activity: Vec<Line> = state
        .activity()
        .map(|entry| {
            let (summary, color) = outcome_summary(&entry.outcome, theme);
            Line::from(vec![
                Span::styled(
                    entry.at.format("%H:%M:%S ").to_string(),
                    Style::default().fg(theme.muted),
                ),
                Span::styled(
                    format!("{} #{} ", entry.kind, entry.job_id),
                    Style::default().fg(theme.text),
                ),
                Span::styled(summary, Style::default().fg(color)),
            ])
        })
        .collect();
    if activity.is_empty() {
        activity.push(Line::from(Span::styled(
            strings.no_activity,
            Style::default().fg(theme.muted),
        )));
    }
    frame.render_widget(
        Paragraph::new(Text::from(activity))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel(strings.activity, theme))
            .wrap(Wrap { trim: true }),
        columns[1],
    );
}

fn outcome_summary(outcome: &ApplyOutcome, theme: Palette) -> (String, Color) {
    match outcome {
        ApplyOutcome::Changed {
            transition,
            elements_changed,
            unknown_elements,
            ..
        } => {
            let mut text = match transition {
                Some((from, to)) => format!("{} -> {}", from.as_str(), to.as_str()),
                None => "assignment".to_string(),
            };
            text.push_str(&format!(", {elements_changed} elements"));
            if !unknown_elements.is_empty() {
                text.push_str(&format!(", {} unknown", unknown_elements.len()));
            }
            (text, theme.ok)
        }
        ApplyOutcome::Unchanged { .. } => ("no change".to_string(), theme.muted),
        ApplyOutcome::UnknownJob { .. } => ("unknown job".to_string(), theme.warn),
        ApplyOutcome::Rejected { status, .. } => {
            (format!("rejected ({})", status.as_str()), theme.warn)
        }
        ApplyOutcome::Stale => ("stale".to_string(), theme.muted),
    }
}

fn render_grid_panel(frame: &mut Frame, app: &mut App, theme: Palette, area: Rect) {
    let strings = app.strings;
    let placement = Placement::compute(app.session.state().store().elements());
    let title = format!(
        "{} {}x{}{}",
        strings.mode_grid,
        placement.cols,
        placement.cols,
        if placement.from_coordinates { " xy" } else { "" }
    );
    let block = panel(&title, theme);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);
    let grid_area = rows[0];

    let state = app.session.state();
    let elements = state.store().elements();
    let view = match grid::fit(grid_area, placement.cols) {
        GridFit::Skip => None,
        GridFit::TooSmall => {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    strings.grid_too_small,
                    Style::default().fg(theme.warn),
                ))
                .wrap(Wrap { trim: true }),
                grid_area,
            );
            None
        }
        GridFit::Fits(geometry) => {
            if elements.is_empty() {
                let note = health_note(
                    strings,
                    &state.health().elements,
                    state.is_reloading(),
                    theme,
                )
                .unwrap_or_else(|| Span::raw(strings.data_empty));
                frame.render_widget(Paragraph::new(Line::from(note)), grid_area);
            }
            for (index, element) in elements.iter().enumerate() {
                let Some((col, row)) = placement.position(index) else {
                    continue;
                };
                let rect = geometry.cell_rect(col, row).intersection(grid_area);
                if rect.width == 0 || rect.height == 0 {
                    continue;
                }
                let color = grid::cell_color(element, &theme);
                let marker = if app.cursor == Some((col, row)) {
                    "+"
                } else if element.status == ElementStatus::Fault {
                    "x"
                } else {
                    ""
                };
                frame.render_widget(
                    Paragraph::new(marker).style(
                        Style::default()
                            .bg(color)
                            .fg(grid::contrast_color(color))
                            .add_modifier(Modifier::BOLD),
                    ),
                    rect,
                );
            }
            Some(GridView {
                geometry,
                placement,
            })
        }
    };

    frame.render_widget(render_legend(strings, theme), rows[1]);
    frame.render_widget(render_ramp(strings, theme, rows[2].width), rows[2]);
    app.set_grid_view(view);
    let detail = match app.cursor_element() {
        Some(element) => Line::from(Span::styled(
            fit_fields(
                &element_fields(app, element),
                rows[3].width.max(12) as usize,
            ),
            Style::default().fg(theme.text),
        )),
        None => Line::from(""),
    };
    frame.render_widget(Paragraph::new(detail), rows[3]);
}

fn render_legend<'a>(strings: &'a Strings, theme: Palette) -> Paragraph<'a> {
    let swatch = |color: Color| Span::styled("  ", Style::default().bg(color));
    Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{}: ", strings.legend),
            Style::default().fg(theme.muted),
        ),
        swatch(theme.fault_cell),
        Span::styled(
            format!(" {}  ", strings.element_fault),
            Style::default().fg(theme.text),
        ),
        swatch(theme.idle_cell),
        Span::styled(
            format!(" {}  ", strings.element_idle),
            Style::default().fg(theme.text),
        ),
        swatch(grid::amplitude_color(50.0)),
        Span::styled(
            format!(" {}", strings.element_active),
            Style::default().fg(theme.text),
        ),
    ]))
}

fn render_ramp<'a>(strings: &'a Strings, theme: Palette, width: u16) -> Paragraph<'a> {
    let label = format!(" {}", strings.ramp);
    let steps = (width as usize)
        .saturating_sub(label.chars().count() + 1)
        .min(RAMP_STEPS);
    let mut spans: Vec<Span> = (0..steps)
        .map(|step| {
            let amplitude = if steps <= 1 {
                0.0
            } else {
                step as f64 * 100.0 / (steps - 1) as f64
            };
            Span::styled(" ", Style::default().bg(grid::amplitude_color(amplitude)))
        })
        .collect();
    spans.push(Span::styled(label, Style::default().fg(theme.muted)));
    Paragraph::new(Line::from(spans))
}

fn element_fields(app: &App, element: &ArrayElement) -> Vec<String> {
    let strings = app.strings;
    let job = element
        .assigned_job
        .map(|id| format!("#{id}"))
        .unwrap_or_else(|| "-".to_string());
    vec![
        format!("{} #{}", strings.detail_element, element.id),
        format!(
            "{}: {}",
            strings.detail_status,
            strings.element_status(element.status)
        ),
        format!(
            "{}: {:.1}",
            strings.detail_amplitude,
            pac_core::clamp_amplitude(element.amplitude)
        ),
        format!("{}: {:.2}", strings.detail_phase, element.phase),
        format!(
            "{}: {}",
            strings.detail_code,
            if element.code.is_empty() {
                "-"
            } else {
                &element.code
            }
        ),
        format!("{}: {job}", strings.detail_job),
    ]
}

fn render_hover_overlay(frame: &mut Frame, app: &App, theme: Palette) {
    let (Some(pointer), Some(element)) = (app.pointer, app.hovered_element()) else {
        return;
    };
    let fields = element_fields(app, element);
    let inner_width = OVERLAY_WIDTH.saturating_sub(2) as usize;
    let lines: Vec<Line> = fields
        .iter()
        .map(|field| {
            Line::from(Span::styled(
                ellipsize(field, inner_width),
                Style::default().fg(theme.text),
            ))
        })
        .collect();
    let height = lines.len() as u16 + 2;
    let area = grid::overlay_rect(pointer, OVERLAY_WIDTH, height, frame.size());
    if area.width == 0 || area.height == 0 {
        return;
    }
    let color = grid::cell_color(element, &theme);
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().bg(theme.bg))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(color))
                    .style(Style::default().bg(theme.bg)),
            ),
        area,
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
}

impl PriorityLevel {
    pub fn of(priority: i64) -> Self {
        if priority >= 8 {
            PriorityLevel::High
        } else if priority >= 4 {
            PriorityLevel::Medium
        } else {
            PriorityLevel::Low
        }
    }

    fn label(self, strings: &Strings) -> &'static str {
        match self {
            PriorityLevel::High => strings.priority_high,
            PriorityLevel::Medium => strings.priority_medium,
            PriorityLevel::Low => strings.priority_low,
        }
    }

    fn color(self, theme: Palette) -> Color {
        match self {
            PriorityLevel::High => theme.critical,
            PriorityLevel::Medium => theme.warn,
            PriorityLevel::Low => theme.ok,
        }
    }
}

/// Scheduler timestamps rendered in local time; unparseable values are shown
/// as received.
pub fn format_created(raw: &str) -> String {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(at) = NaiveDateTime::parse_from_str(raw, pattern) {
            return at.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    raw.to_string()
}

fn job_row<'a>(job: &'a Job, strings: &'a Strings, theme: Palette) -> Row<'a> {
    let level = PriorityLevel::of(job.priority);
    Row::new(vec![
        Cell::from(format!("#{}", job.id)),
        Cell::from(job.name.as_str()),
        Cell::from(Line::from(vec![
            Span::styled(
                format!(" {} ", level.label(strings)),
                Style::default()
                    .fg(theme.bg)
                    .bg(level.color(theme))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(format!(" {}", job.priority)),
        ])),
        Cell::from(
            job.resource_type
                .as_deref()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(strings.default_resource),
        ),
        Cell::from(Span::styled(
            strings.job_status(job.status),
            Style::default().fg(job_status_color(job.status, theme)),
        )),
        Cell::from(format_created(&job.created_at)),
    ])
    .style(Style::default().fg(theme.text))
}

fn render_jobs(frame: &mut Frame, app: &App, theme: Palette, area: Rect) {
    let strings = app.strings;
    let state = app.session.state();
    let jobs = state.store().jobs();
    let block = panel(strings.mode_jobs, theme);
    if jobs.is_empty() {
        let note = health_note(strings, &state.health().jobs, state.is_reloading(), theme)
            .unwrap_or_else(|| Span::raw(strings.data_empty));
        frame.render_widget(
            Paragraph::new(Line::from(note))
                .style(Style::default().bg(theme.surface))
                .block(block),
            area,
        );
        return;
    }

    let header = Row::new(vec![
        strings.col_id,
        strings.col_name,
        strings.col_priority,
        strings.col_resource,
        strings.col_status,
        strings.col_created,
    ])
    .style(
        Style::default()
            .fg(theme.title)
            .add_modifier(Modifier::BOLD),
    );
    let rows: Vec<Row> = jobs
        .iter()
        .skip(app.jobs_scroll)
        .map(|job| job_row(job, strings, theme))
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Min(12),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(11),
            Constraint::Length(17),
        ],
    )
    .header(header)
    .style(Style::default().bg(theme.surface))
    .block(block);
    frame.render_widget(table, area);
}

fn render_help_overlay(frame: &mut Frame, strings: &Strings, theme: Palette) {
    let area = centered_rect(60, 50, frame.size());
    let lines = vec![
        Line::from(Span::styled(
            strings.help_title,
            Style::default()
                .fg(theme.title)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("  {}", strings.help_modes)),
        Line::from(format!("  {}", strings.help_tab)),
        Line::from(format!("  {}", strings.help_cursor)),
        Line::from(format!("  {}", strings.help_reload)),
        Line::from(format!("  {}", strings.help_reconnect)),
        Line::from(format!("  {}", strings.help_quit)),
    ];
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(theme.text).bg(theme.surface))
            .block(panel(strings.help_title, theme))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}

fn ellipsize(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    if max <= 3 {
        return "...".chars().take(max).collect();
    }
    let prefix: String = input.chars().take(max - 3).collect();
    format!("{prefix}...")
}

fn fit_fields(fields: &[String], max: usize) -> String {
    let mut output = String::new();
    for field in fields {
        let candidate = if output.is_empty() {
            field.clone()
        } else {
            format!("{output} | {field}")
        };
        if candidate.chars().count() > max {
            if output.is_empty() {
                return ellipsize(field, max);
            }
            break;
        }
        output = candidate;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{load_elements, test_app};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
    use pac_core::{Snapshot, StreamEvent};
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &mut App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render_ui(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn job(id: u64, priority: i64, status: JobStatus) -> Job {
        Job {
            id,
            name: format!("sweep-{id}"),
            priority,
            status,
            needed_elements: 4,
            duration_seconds: 60,
            created_at: "not a timestamp".to_string(),
            resource_type: None,
        }
    }

    #[test]
    fn dashboard_shows_counts_and_offline_banner() {
        let mut app = test_app();
        load_elements(&mut app, 256);
        let screen = draw(&mut app, 120, 30);
        assert!(screen.contains("Phased Array Console"));
        assert!(screen.contains("Live updates unavailable"));
        assert!(screen.contains("Elements  256"));
        assert!(screen.contains("No events received"));
    }

    #[test]
    fn grid_renders_and_records_layout() {
        let mut app = test_app();
        load_elements(&mut app, 256);
        app.handle_key(KeyEvent::new(KeyCode::Char('2'), KeyModifiers::NONE));
        let screen = draw(&mut app, 120, 45);
        assert!(screen.contains("Legend"));
        let view = app.grid_view().expect("grid laid out");
        assert_eq!(view.placement.cols, 16);
        assert!(view.placement.position(255).is_some());
        assert!(view.placement.position(256).is_none());

        let rect = view.geometry.cell_rect(0, 0);
        app.handle_mouse(MouseEvent {
            kind: MouseEventKind::Moved,
            column: rect.x,
            row: rect.y,
            modifiers: KeyModifiers::NONE,
        });
        let screen = draw(&mut app, 120, 45);
        assert!(screen.contains("Element #1"));
        assert!(screen.contains("Amplitude: 0.0"));
    }

    #[test]
    fn grid_tolerates_tiny_and_empty_viewports() {
        let mut app = test_app();
        load_elements(&mut app, 256);
        app.handle_key(KeyEvent::new(KeyCode::Char('2'), KeyModifiers::NONE));
        let screen = draw(&mut app, 30, 12);
        assert!(screen.contains("Window"));
        assert!(app.grid_view().is_none());
        draw(&mut app, 0, 0);
        assert!(app.grid_view().is_none());
    }

    #[test]
    fn jobs_table_shows_badges_and_raw_timestamps() {
        let mut app = test_app();
        app.session.state_mut().store_mut().load_snapshot(Snapshot {
            jobs: vec![job(1, 9, JobStatus::Running), job(2, 1, JobStatus::Pending)],
            elements: Vec::new(),
        });
        app.session
            .state_mut()
            .store_mut()
            .apply_event(&StreamEvent::JobEnded { job_id: 1 });
        app.handle_key(KeyEvent::new(KeyCode::Char('3'), KeyModifiers::NONE));
        let screen = draw(&mut app, 120, 20);
        assert!(screen.contains("sweep-1"));
        assert!(screen.contains("High"));
        assert!(screen.contains("Low"));
        assert!(screen.contains("Completed"));
        assert!(screen.contains("Antenna Array"));
    }

    #[test]
    fn priority_levels_follow_thresholds() {
        assert_eq!(PriorityLevel::of(8), PriorityLevel::High);
        assert_eq!(PriorityLevel::of(7), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::of(4), PriorityLevel::Medium);
        assert_eq!(PriorityLevel::of(3), PriorityLevel::Low);
        assert_eq!(PriorityLevel::of(50), PriorityLevel::High);
    }

    #[test]
    fn created_time_falls_back_to_raw_text() {
        assert_eq!(format_created("yesterday"), "yesterday");
        assert_eq!(format_created("2024-05-01 10:00:00"), "2024-05-01 10:00");
        assert_eq!(format_created("2024-05-01T10:00:00"), "2024-05-01 10:00");
        assert_eq!(format_created("2024-05-01T10:00:00Z").len(), 16);
    }

    #[test]
    fn fit_fields_drops_what_does_not_fit() {
        let fields = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        assert_eq!(fit_fields(&fields, 12), "alpha | beta");
        assert_eq!(fit_fields(&fields, 4), "a...");
    }
}

use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use miette::IntoDiagnostic;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use crate::app::{PipelineReport, Progress, ProgressEvent, ProgressSink, ProgressUnit};
use crate::domain::Stage;
use crate::error::DragontailError;

const EVENTS_MAX: usize = 6;
const LOGS_MAX: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Operational,
    Logs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageStatus {
    Pending,
    Active,
    Done,
}

#[derive(Debug, Clone)]
struct StageState {
    status: StageStatus,
    detail: String,
    progress: Option<Progress>,
}

#[derive(Debug)]
struct DashboardState {
    current: Stage,
    stages: Vec<StageState>,
    events: VecDeque<String>,
    logs: VecDeque<String>,
    view: View,
    started: Instant,
    finished: bool,
}

pub struct Tui {
    state: Arc<Mutex<DashboardState>>,
    log_scroll: u16,
}

struct TuiProgress {
    state: Arc<Mutex<DashboardState>>,
}

impl ProgressSink for TuiProgress {
    fn event(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            let idx = event.stage.index();
            for earlier in state.stages.iter_mut().take(idx) {
                earlier.status = StageStatus::Done;
                earlier.progress = earlier.progress.map(complete);
            }
            state.current = event.stage;

            let stage = &mut state.stages[idx];
            stage.status = StageStatus::Active;
            stage.detail = event.message.clone();
            if event.progress.is_some() {
                stage.progress = event.progress;
                return;
            }

            let line = format!("{}: {}", event.stage.label(), event.message);
            push_bounded(&mut state.events, line.clone(), EVENTS_MAX);
            push_bounded(
                &mut state.logs,
                format!("[{}] {line}", chrono::Local::now().format("%H:%M:%S")),
                LOGS_MAX,
            );
        }
    }
}

impl Tui {
    pub fn new() -> Self {
        let stages = Stage::ALL
            .iter()
            .map(|_| StageState {
                status: StageStatus::Pending,
                detail: "waiting".to_string(),
                progress: None,
            })
            .collect();
        Self {
            state: Arc::new(Mutex::new(DashboardState {
                current: Stage::Resolve,
                stages,
                events: VecDeque::new(),
                logs: VecDeque::new(),
                view: View::Operational,
                started: Instant::now(),
                finished: false,
            })),
            log_scroll: 0,
        }
    }

    pub fn run<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, DragontailError> + Send + 'static,
        R: Send + 'static,
    {
        enable_raw_mode().into_diagnostic()?;
        guarded(
            || {
                io::stdout().execute(EnterAlternateScreen).into_diagnostic()?;
                self.drive(f)
            },
            leave_screen,
        )
    }

    fn drive<F, R>(&mut self, f: F) -> miette::Result<R>
    where
        F: FnOnce(&dyn ProgressSink) -> Result<R, DragontailError> + Send + 'static,
        R: Send + 'static,
    {
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend).into_diagnostic()?;
        terminal.clear().into_diagnostic()?;

        let (tx, rx) = mpsc::channel();
        let sink = TuiProgress {
            state: self.state.clone(),
        };
        let handle = thread::spawn(move || tx.send(f(&sink)));

        let mut tick = 0usize;
        loop {
            if let Ok(state) = self.state.lock() {
                terminal
                    .draw(|frame| draw_ui(frame, &state, self.log_scroll, tick))
                    .into_diagnostic()?;
            }

            if let Some(outcome) = settle(rx.try_recv()) {
                handle.join().ok();
                if let Ok(mut state) = self.state.lock() {
                    state.finished = outcome.is_ok();
                }
                return outcome;
            }

            if event::poll(Duration::from_millis(120)).into_diagnostic()? {
                if let Event::Key(key) = event::read().into_diagnostic()? {
                    if self.handle_key(key) {
                        return Err(miette::Report::msg("aborted"));
                    }
                }
            }

            tick = tick.wrapping_add(1);
        }
    }

    pub fn finish(&mut self, report: &PipelineReport) -> miette::Result<()> {
        let elapsed = self
            .state
            .lock()
            .map(|state| state.started.elapsed())
            .unwrap_or_default();
        let mut lines = vec![
            format!("DDragon {} ready in {:.1}s", report.version, elapsed.as_secs_f64()),
            format!("  archive:    {:?}", report.archive).to_lowercase(),
            format!("  extraction: {:?}", report.extraction).to_lowercase(),
            format!("  champions:  {}", report.champion_count),
            format!("  tiles:      {}", report.tiles_copied),
        ];
        if !report.missing_tiles.is_empty() {
            lines.push(format!(
                "  missing tiles: {}",
                report.missing_tiles.join(", ")
            ));
        }
        println!("{}", lines.join("\n"));
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind != KeyEventKind::Press {
            return false;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('l') | KeyCode::F(4) => {
                if let Ok(mut state) = self.state.lock() {
                    state.view = match state.view {
                        View::Operational => View::Logs,
                        View::Logs => View::Operational,
                    };
                }
                self.log_scroll = 0;
            }
            KeyCode::Up => self.log_scroll = self.log_scroll.saturating_add(1),
            KeyCode::Down => self.log_scroll = self.log_scroll.saturating_sub(1),
            _ => {}
        }
        false
    }
}

impl Default for Tui {
    fn default() -> Self {
        Self::new()
    }
}

fn guarded<T>(
    body: impl FnOnce() -> miette::Result<T>,
    restore: impl FnOnce() -> miette::Result<()>,
) -> miette::Result<T> {
    let result = body();
    let restored = restore();
    let value = result?;
    restored?;
    Ok(value)
}

fn settle<R>(
    received: Result<Result<R, DragontailError>, TryRecvError>,
) -> Option<miette::Result<R>> {
    match received {
        Ok(result) => Some(result.map_err(miette::Report::new)),
        Err(TryRecvError::Empty) => None,
        Err(TryRecvError::Disconnected) => Some(Err(miette::Report::msg(
            "pipeline thread exited without a result",
        ))),
    }
}

fn leave_screen() -> miette::Result<()> {
    disable_raw_mode().into_diagnostic()?;
    let mut stdout = io::stdout();
    stdout.execute(LeaveAlternateScreen).into_diagnostic()?;
    Ok(())
}

fn draw_ui(frame: &mut ratatui::Frame, state: &DashboardState, scroll: u16, tick: usize) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(2),
        ])
        .split(frame.area());

    frame.render_widget(draw_header(state, tick), chunks[0]);
    match state.view {
        View::Operational => {
            let main = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                .split(chunks[1]);
            frame.render_widget(draw_stages(state), main[0]);
            frame.render_widget(draw_events(state), main[1]);
        }
        View::Logs => frame.render_widget(draw_logs_view(state, scroll), chunks[1]),
    }
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            "q quit · l logs · ↑/↓ scroll",
            Style::default().fg(Color::Gray),
        )))
        .block(Block::default().borders(Borders::TOP)),
        chunks[2],
    );
}

fn draw_header(state: &DashboardState, tick: usize) -> Paragraph<'static> {
    let hb = if tick % 2 == 0 { "*" } else { " " };
    let header_line = Line::from(vec![
        Span::styled(
            "DRAGONTAIL",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(env!("CARGO_PKG_VERSION"), Style::default().fg(Color::Gray)),
        Span::raw("   Stage: "),
        Span::styled(state.current.label(), Style::default().fg(Color::Cyan)),
        Span::raw(format!("   Elapsed: {}s   ", state.started.elapsed().as_secs())),
        Span::styled(hb, Style::default().fg(Color::Green)),
    ]);
    Paragraph::new(vec![header_line])
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::BOTTOM))
}

fn draw_stages(state: &DashboardState) -> Paragraph<'static> {
    let mut lines = vec![Line::from(Span::styled(
        "PIPELINE",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];
    for (stage, info) in Stage::ALL.iter().zip(state.stages.iter()) {
        let (marker, color) = match info.status {
            StageStatus::Pending => ("·", Color::DarkGray),
            StageStatus::Active if state.finished => ("✓", Color::Green),
            StageStatus::Active => (">", Color::Cyan),
            StageStatus::Done => ("✓", Color::Green),
        };
        let mut spans = vec![
            Span::styled(format!("{marker} "), Style::default().fg(color)),
            Span::styled(format!("{:<10}", stage.label()), Style::default().fg(color)),
        ];
        if let Some(progress) = info.progress {
            spans.push(Span::raw(progress_bar(progress.percent().unwrap_or(0))));
            spans.push(Span::raw(format!(" {}", describe(progress))));
        }
        lines.push(Line::from(spans));
        if info.status != StageStatus::Pending {
            lines.push(Line::from(Span::styled(
                format!("    {}", info.detail),
                Style::default().fg(Color::Gray),
            )));
        }
    }
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::RIGHT))
        .wrap(Wrap { trim: true })
}

fn draw_events(state: &DashboardState) -> Paragraph<'static> {
    let mut lines = vec![Line::from(Span::styled(
        "RECENT EVENTS",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    ))];
    for event in state.events.iter().rev() {
        lines.push(Line::from(format!("- {event}")));
    }
    Paragraph::new(lines).wrap(Wrap { trim: true })
}

fn draw_logs_view(state: &DashboardState, scroll: u16) -> Paragraph<'static> {
    let total = state.logs.len();
    let visible = 12usize;
    let start = total.saturating_sub(scroll as usize + visible);
    let mut lines = Vec::with_capacity(visible + 1);
    lines.push(Line::from(Span::styled(
        "LOGS (scrollable)",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )));
    for line in state.logs.iter().skip(start).take(visible) {
        lines.push(Line::from(line.clone()));
    }
    Paragraph::new(lines).wrap(Wrap { trim: true })
}

fn complete(progress: Progress) -> Progress {
    Progress {
        done: progress.total.unwrap_or(progress.done),
        ..progress
    }
}

fn describe(progress: Progress) -> String {
    match (progress.unit, progress.total) {
        (ProgressUnit::Bytes, Some(total)) => format!(
            "{} / {}",
            bytes_to_human(progress.done),
            bytes_to_human(total)
        ),
        (ProgressUnit::Bytes, None) => bytes_to_human(progress.done),
        (ProgressUnit::Files, Some(total)) => format!("{} / {} files", progress.done, total),
        (ProgressUnit::Files, None) => format!("{} files", progress.done),
    }
}

fn progress_bar(percent: u8) -> String {
    let total = 20;
    let filled = (percent as usize * total) / 100;
    let mut out = String::from("[");
    for i in 0..total {
        out.push(if i < filled { '#' } else { '.' });
    }
    out.push(']');
    out.push_str(&format!(" {percent:>3}%"));
    out
}

fn push_bounded(buffer: &mut VecDeque<String>, item: String, max: usize) {
    buffer.push_back(item);
    while buffer.len() > max {
        buffer.pop_front();
    }
}

fn bytes_to_human(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[0])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use chrono::DateTime;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine, Points, Rectangle};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph};

use courtview::court;
use courtview::state::{self, AppState, ConnectionStatus, Screen, apply_delta};
use courtview::{fake_feed, feed};

struct App {
    state: AppState,
    should_quit: bool,
}

impl App {
    fn new() -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('1') => self.state.screen = Screen::Table,
            KeyCode::Char('2') => self.state.screen = Screen::Histogram,
            KeyCode::Char('3') => self.state.screen = Screen::Court,
            KeyCode::Tab => {
                self.state.screen = match self.state.screen {
                    Screen::Table => Screen::Histogram,
                    Screen::Histogram => Screen::Court,
                    Screen::Court => Screen::Table,
                };
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.scroll_table_down(),
            KeyCode::Char('k') | KeyCode::Up => self.state.scroll_table_up(),
            KeyCode::Char('n') => self.state.cycle_selection_next(),
            KeyCode::Char('p') => self.state.cycle_selection_prev(),
            KeyCode::Char('x') | KeyCode::Esc => self.state.select_player(None),
            KeyCode::Char('c') => {
                self.state.clear_trails();
                self.state.push_log("[INFO] Trails cleared");
            }
            KeyCode::Char('?') => self.state.help_overlay = !self.state.help_overlay,
            _ => {}
        }
    }
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let feed_mode = std::env::var("APP_FEED").unwrap_or_default().to_lowercase();
    let stream = if feed_mode == "demo" {
        fake_feed::spawn_demo_feed(tx);
        None
    } else {
        Some(feed::spawn_stream(tx))
    };

    let mut app = App::new();
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Some(stream) = stream {
        stream.shutdown();
    }

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<state::Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header =
        Paragraph::new(header_lines(&app.state)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Table => render_table(frame, chunks[1], &app.state),
        Screen::Histogram => render_histogram(frame, chunks[1], &app.state),
        Screen::Court => render_court(frame, chunks[1], &app.state),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_lines(state: &AppState) -> Vec<Line<'static>> {
    let status_color = match state.status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Disconnected => Color::Yellow,
        ConnectionStatus::Error => Color::Red,
    };
    let line1 = Line::from(vec![
        Span::styled(
            format!("COURTVIEW | {} | ", screen_label(state.screen)),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("● {}", state.status.label()),
            Style::default().fg(status_color),
        ),
    ]);
    let selected = state
        .selected_player_id
        .clone()
        .unwrap_or_else(|| "all".to_string());
    let line2 = Line::from(format!(
        "Frames: {} | Unique entities: {} | Players: {} | Showing: {}",
        state.frames.len(),
        state.unique_entities,
        state.players.len(),
        selected
    ));
    vec![line1, line2]
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Table => {
            "1 Table | 2 Histogram | 3 Court | Tab Cycle | j/k/↑/↓ Scroll | ? Help | q Quit"
                .to_string()
        }
        Screen::Histogram => {
            "1 Table | 2 Histogram | 3 Court | Tab Cycle | ? Help | q Quit".to_string()
        }
        Screen::Court => {
            "1 Table | 2 Histogram | 3 Court | n/p Select | x/Esc All | c Clear trails | ? Help | q Quit"
                .to_string()
        }
    }
}

fn screen_label(screen: Screen) -> &'static str {
    match screen {
        Screen::Table => "TABLE",
        Screen::Histogram => "HISTOGRAM",
        Screen::Court => "COURT",
    }
}

fn table_columns() -> [Constraint; 6] {
    [
        Constraint::Length(10),
        Constraint::Length(14),
        Constraint::Length(6),
        Constraint::Length(4),
        Constraint::Min(28),
        Constraint::Length(6),
    ]
}

fn render_table(frame: &mut Frame, area: Rect, state: &AppState) {
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(area);

    let widths = table_columns();
    render_table_header(frame, sections[0], &widths);

    let list_area = sections[1];
    let rows = state.detection_rows();
    if rows.is_empty() {
        let empty =
            Paragraph::new("No frames received yet").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, list_area);
        return;
    }

    if list_area.height == 0 {
        return;
    }

    let visible = list_area.height as usize;
    let total = rows.len();
    let max_start = total.saturating_sub(visible);
    let start = state.table_scroll.min(max_start);
    let end = (start + visible).min(total);

    for (i, idx) in (start..end).enumerate() {
        let row_area = Rect {
            x: list_area.x,
            y: list_area.y + i as u16,
            width: list_area.width,
            height: 1,
        };

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(widths)
            .split(row_area);

        let row = &rows[idx];
        let time = format_frame_time(row.ts);
        let bbox = format!(
            "{:.0},{:.0} {:.0},{:.0}",
            row.bbox[0], row.bbox[1], row.bbox[2], row.bbox[3]
        );
        let conf = format!("{:.2}", row.conf);
        let color = row
            .color
            .or_else(|| state.players.get(&row.person_id).map(|p| p.color));

        render_cell_text(frame, cols[0], &row.frame_id, Style::default());
        render_cell_text(frame, cols[1], &time, Style::default());
        render_cell_text(frame, cols[2], &row.person_id, Style::default());
        render_swatch(frame, cols[3], color);
        render_cell_text(frame, cols[4], &bbox, Style::default());
        render_cell_text(frame, cols[5], &conf, Style::default());
    }
}

fn render_table_header(frame: &mut Frame, area: Rect, widths: &[Constraint]) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(widths)
        .split(area);
    let style = Style::default().add_modifier(Modifier::BOLD);

    render_cell_text(frame, cols[0], "Frame", style);
    render_cell_text(frame, cols[1], "Time", style);
    render_cell_text(frame, cols[2], "ID", style);
    render_cell_text(frame, cols[3], "Col", style);
    render_cell_text(frame, cols[4], "BBox", style);
    render_cell_text(frame, cols[5], "Conf", style);
}

fn render_cell_text(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    let text_area = Rect {
        x: area.x,
        y: area.y + (area.height / 2),
        width: area.width,
        height: 1,
    };
    let paragraph = Paragraph::new(text).style(style);
    frame.render_widget(paragraph, text_area);
}

fn render_swatch(frame: &mut Frame, area: Rect, color: Option<(u8, u8, u8)>) {
    match color {
        Some((r, g, b)) => {
            let swatch = Paragraph::new("██").style(Style::default().fg(Color::Rgb(r, g, b)));
            frame.render_widget(swatch, area);
        }
        None => render_cell_text(frame, area, "--", Style::default().fg(Color::DarkGray)),
    }
}

fn render_histogram(frame: &mut Frame, area: Rect, state: &AppState) {
    const BAR_WIDTH: u16 = 5;
    const BAR_GAP: u16 = 1;

    let block = Block::default()
        .title("Detections per frame")
        .borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let limit = ((inner.width / (BAR_WIDTH + BAR_GAP)) as usize).max(1);
    let counts = state.persons_per_frame(limit);
    if counts.is_empty() {
        let empty =
            Paragraph::new("No frames received yet").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }

    let bars: Vec<Bar> = counts
        .iter()
        .map(|(id, count)| {
            Bar::default()
                .value(*count)
                .label(Line::from(bar_label(id)))
                .style(Style::default().fg(Color::Cyan))
                .value_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        })
        .collect();

    let chart = BarChart::default()
        .data(BarGroup::default().bars(&bars))
        .bar_width(BAR_WIDTH)
        .bar_gap(BAR_GAP);
    frame.render_widget(chart, inner);
}

fn bar_label(frame_id: &str) -> String {
    let count = frame_id.chars().count();
    if count <= 5 {
        frame_id.to_string()
    } else {
        frame_id.chars().skip(count - 5).collect()
    }
}

fn render_court(frame: &mut Frame, area: Rect, state: &AppState) {
    let canvas = Canvas::default()
        .block(Block::default().title("Court").borders(Borders::ALL))
        .x_bounds([0.0, court::STAGE_WIDTH])
        .y_bounds([0.0, court::STAGE_HEIGHT])
        .paint(|ctx| {
            // Canvas y grows upward; display pixels grow downward.
            let flip = |y: f64| court::STAGE_HEIGHT - y;

            ctx.draw(&Rectangle {
                x: court::COURT_X,
                y: flip(court::COURT_Y + court::COURT_HEIGHT),
                width: court::COURT_WIDTH,
                height: court::COURT_HEIGHT,
                color: Color::White,
            });

            let net_x = court::COURT_X + court::COURT_WIDTH / 2.0;
            ctx.draw(&CanvasLine {
                x1: net_x,
                y1: flip(court::COURT_Y),
                x2: net_x,
                y2: flip(court::COURT_Y + court::COURT_HEIGHT),
                color: Color::DarkGray,
            });

            for player in state.trail_players() {
                let (r, g, b) = player.color;
                let color = Color::Rgb(r, g, b);

                for pair in player.positions.windows(2) {
                    ctx.draw(&CanvasLine {
                        x1: pair[0].x as f64,
                        y1: flip(pair[0].y as f64),
                        x2: pair[1].x as f64,
                        y2: flip(pair[1].y as f64),
                        color,
                    });
                }

                if let Some(last) = player.positions.last() {
                    let x = last.x as f64;
                    let y = flip(last.y as f64);
                    ctx.draw(&Points {
                        coords: &[(x, y)],
                        color,
                    });
                    ctx.print(
                        x,
                        y,
                        Line::from(Span::styled(
                            player.id.clone(),
                            Style::default().fg(color).add_modifier(Modifier::BOLD),
                        )),
                    );
                }
            }
        });
    frame.render_widget(canvas, area);
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_frame_time(ts: f64) -> String {
    if ts <= 0.0 {
        return "-".to_string();
    }
    match DateTime::from_timestamp_millis((ts * 1000.0) as i64) {
        Some(dt) => dt.format("%H:%M:%S%.3f").to_string(),
        None => "-".to_string(),
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Courtview - Help",
        "",
        "Global:",
        "  1            Detection table",
        "  2            Histogram",
        "  3            2D court",
        "  Tab          Cycle screens",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Table:",
        "  j/k or ↑/↓   Scroll",
        "",
        "Court:",
        "  n / p        Select next/prev player",
        "  x / Esc      Show all players",
        "  c            Clear trails",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}

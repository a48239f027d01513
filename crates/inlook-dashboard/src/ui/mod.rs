use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use tracing::{info, warn};

use crate::client::{ApiClient, RootAction};
use crate::config::DashboardConfig;
use crate::error::{Error, Result};
use crate::form::Form;
use crate::instance::{BadgeTone, InstanceNode};
use crate::output::lines::select_summary;
use crate::output::{ViewLine, ViewLineKind, tree_lines};
use crate::registry::RegistrySource;
use crate::sanitize::sanitize_inline;
use crate::tree_view::{NodeKey, TreeSession};

const MAX_STATUS_LINES: usize = 200;
const MAX_CELL_CHARS: usize = 120;

enum PollEvent {
    Tree(Result<InstanceNode>),
    PluginNames(Result<Vec<String>>),
    Workflows(Result<Vec<String>>),
    Action {
        action: RootAction,
        result: Result<()>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputMode {
    Normal,
    ConfirmAction(RootAction),
}

struct App {
    client: Arc<ApiClient>,
    session: TreeSession,
    tree: Option<InstanceNode>,
    lines: Vec<ViewLine>,
    selected: Option<NodeKey>,
    list: ListState,

    plugin_names: Vec<String>,
    workflows: Vec<String>,
    status: VecDeque<String>,
    last_error: Option<String>,
    last_refresh: Option<String>,

    poll_interval: Duration,
    next_poll: Instant,
    poll_in_flight: bool,
    poll_thread: Option<JoinHandle<()>>,

    input: InputMode,
    tx: mpsc::Sender<PollEvent>,
    rx: mpsc::Receiver<PollEvent>,
}

impl App {
    fn new(client: ApiClient, cfg: &DashboardConfig) -> Self {
        let client = Arc::new(client);
        let source: Arc<dyn RegistrySource> = client.clone();
        let (tx, rx) = mpsc::channel();
        Self {
            client,
            session: TreeSession::new(source),
            tree: None,
            lines: Vec::new(),
            selected: None,
            list: ListState::default(),
            plugin_names: Vec::new(),
            workflows: Vec::new(),
            status: VecDeque::new(),
            last_error: None,
            last_refresh: None,
            poll_interval: cfg.poll.interval(),
            next_poll: Instant::now(),
            poll_in_flight: false,
            poll_thread: None,
            input: InputMode::Normal,
            tx,
            rx,
        }
    }

    fn push_status(&mut self, line: impl Into<String>) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        if self.status.len() >= MAX_STATUS_LINES {
            self.status.pop_front();
        }
        self.status.push_back(format!("{stamp} {}", line.into()));
    }

    fn request_refresh(&mut self) {
        if self.poll_in_flight {
            return;
        }
        self.poll_in_flight = true;
        self.next_poll = Instant::now() + self.poll_interval;
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name("tree-poll".into())
            .spawn(move || {
                let _ = tx.send(PollEvent::Tree(client.fetch_instance_tree()));
                let _ = tx.send(PollEvent::PluginNames(client.fetch_plugin_names()));
                let _ = tx.send(PollEvent::Workflows(client.fetch_workflows()));
            });
        match spawned {
            Ok(handle) => self.poll_thread = Some(handle),
            Err(e) => {
                self.poll_in_flight = false;
                self.push_status(format!("refresh failed to start: {e}"));
            }
        }
    }

    fn start_action(&mut self, action: RootAction) {
        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        self.push_status(format!("{} requested", action.label()));
        let spawned = thread::Builder::new()
            .name(format!("action-{}", action.label()))
            .spawn(move || {
                let result = client.run_action(action);
                let _ = tx.send(PollEvent::Action { action, result });
            });
        if let Err(e) = spawned {
            self.push_status(format!("{} failed to start: {e}", action.label()));
        }
    }

    fn drain_events(&mut self) {
        // Checked before draining: a finished thread has already sent everything.
        let poll_done = self.poll_thread.as_ref().is_some_and(JoinHandle::is_finished);
        let mut events = Vec::new();
        while let Ok(ev) = self.rx.try_recv() {
            events.push(ev);
        }
        for ev in events {
            match ev {
                PollEvent::Tree(Ok(tree)) => {
                    self.poll_in_flight = false;
                    self.last_error = None;
                    self.last_refresh =
                        Some(chrono::Local::now().format("%H:%M:%S").to_string());
                    if self.tree.is_none() {
                        self.push_status(format!("loaded {} instances", tree.count()));
                    }
                    self.tree = Some(tree);
                }
                PollEvent::Tree(Err(e)) => {
                    self.poll_in_flight = false;
                    warn!(error = %e, "instance tree refresh failed");
                    if self.last_error.is_none() {
                        self.push_status(format!("refresh failed: {e}"));
                    }
                    self.last_error = Some(e.to_string());
                }
                PollEvent::PluginNames(Ok(names)) => self.plugin_names = names,
                PollEvent::PluginNames(Err(e)) => {
                    warn!(error = %e, "plugin name refresh failed");
                }
                PollEvent::Workflows(Ok(names)) => self.workflows = names,
                PollEvent::Workflows(Err(e)) => {
                    warn!(error = %e, "workflow list refresh failed");
                }
                PollEvent::Action { action, result } => match result {
                    Ok(()) => {
                        info!(action = action.label(), "root action done");
                        self.push_status(format!("{} done", action.label()));
                        self.next_poll = Instant::now();
                    }
                    Err(e) => {
                        warn!(action = action.label(), error = %e, "root action failed");
                        self.push_status(format!("{} failed: {e}", action.label()));
                    }
                },
            }
        }
        if poll_done {
            self.reap_poll_thread();
        }
        self.session.registry_mut().drain();
    }

    fn reap_poll_thread(&mut self) {
        let Some(handle) = self.poll_thread.take() else {
            return;
        };
        let panicked = handle.join().is_err();
        if self.poll_in_flight {
            self.poll_in_flight = false;
            warn!(panicked, "tree refresh ended without a result");
            self.push_status("refresh ended without a result");
        }
    }

    fn rebuild_lines(&mut self) {
        let Some(tree) = self.tree.as_ref() else {
            self.lines.clear();
            self.list.select(None);
            return;
        };
        let view = self.session.render(tree);
        self.lines = tree_lines(&view);

        let idx = self
            .selected
            .as_ref()
            .and_then(|key| self.lines.iter().position(|l| l.header_key() == Some(key)))
            .or_else(|| self.lines.iter().position(|l| l.header_key().is_some()));
        self.selected = idx.and_then(|i| self.lines[i].header_key().cloned());
        self.list.select(idx);
    }

    fn select_header(&mut self, forward: bool) {
        let Some(cur) = self.list.selected() else {
            return;
        };
        let next = if forward {
            self.lines
                .iter()
                .enumerate()
                .skip(cur + 1)
                .find(|(_, l)| l.header_key().is_some())
                .map(|(i, _)| i)
        } else {
            self.lines[..cur]
                .iter()
                .rposition(|l| l.header_key().is_some())
        };
        if let Some(i) = next {
            self.selected = self.lines[i].header_key().cloned();
            self.list.select(Some(i));
        }
    }

    fn toggle_selected(&mut self) {
        if let Some(key) = self.selected.clone() {
            let expanded = self.session.toggle(&key);
            self.push_status(format!(
                "{} {key}",
                if expanded { "configure" } else { "hide" }
            ));
        }
    }

    fn set_all(&mut self, expanded: bool) {
        if let Some(tree) = self.tree.as_ref() {
            self.session.set_all(tree, expanded);
        }
    }

    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> bool {
        if mods.contains(KeyModifiers::CONTROL) && matches!(code, KeyCode::Char('c')) {
            return true;
        }

        if let InputMode::ConfirmAction(action) = self.input {
            match code {
                KeyCode::Enter | KeyCode::Char('y') => {
                    self.input = InputMode::Normal;
                    self.start_action(action);
                }
                KeyCode::Esc | KeyCode::Char('n') => self.input = InputMode::Normal,
                _ => {}
            }
            return false;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Down | KeyCode::Char('j') => self.select_header(true),
            KeyCode::Up | KeyCode::Char('k') => self.select_header(false),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('e') => self.set_all(true),
            KeyCode::Char('c') => self.set_all(false),
            KeyCode::Char('r') => self.request_refresh(),
            KeyCode::Char('m') => {
                self.session.remount();
                self.push_status("forms reloaded");
            }
            KeyCode::Char('i') => self.input = InputMode::ConfirmAction(RootAction::Instantiate),
            KeyCode::Char('x') => self.input = InputMode::ConfirmAction(RootAction::Execute),
            KeyCode::Char('R') => self.input = InputMode::ConfirmAction(RootAction::Reset),
            KeyCode::Char('S') => self.input = InputMode::ConfirmAction(RootAction::Shutdown),
            _ => {}
        }
        false
    }

    fn draw(&mut self, f: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(f.area());

        self.draw_header(f, chunks[0]);
        self.draw_main(f, chunks[1]);
        self.draw_footer(f, chunks[2]);
        self.draw_modal(f);
    }

    fn draw_header(&self, f: &mut ratatui::Frame, area: Rect) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let refreshed = match (&self.last_error, &self.last_refresh) {
            (Some(_), _) => Span::styled("backend unreachable", Style::default().fg(Color::Red)),
            (None, Some(at)) => Span::styled(
                format!("refreshed {at}"),
                Style::default().fg(Color::Green),
            ),
            (None, None) => Span::styled("loading...", Style::default().fg(Color::Gray)),
        };
        let line = Line::from(vec![
            Span::styled("Inlook: Plugin Instances", Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(self.client.base_url().to_string(), Style::default().fg(Color::Gray)),
            Span::raw("  "),
            refreshed,
            Span::raw("  "),
            Span::styled(now, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(Text::from(line)).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_type(BorderType::Plain),
        );
        f.render_widget(p, area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame, area: Rect) {
        let hint = "[j/k] Move  [Enter/Space] Configure/Hide  [e/c] Expand/Collapse all  [r] Refresh  [m] Reload forms  [i] Instantiate  [x] Execute  [R] Reset  [S] Shutdown  [q] Quit";
        let p = Paragraph::new(hint)
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::TOP));
        f.render_widget(p, area);
    }

    fn draw_main(&mut self, f: &mut ratatui::Frame, area: Rect) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(42)])
            .split(area);

        let title = match self.tree.as_ref() {
            Some(tree) => format!("Instance Tree ({} nodes)", tree.count()),
            None => "Instance Tree".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded);

        if self.lines.is_empty() {
            let msg = self
                .last_error
                .clone()
                .unwrap_or_else(|| "waiting for the backend...".into());
            let p = Paragraph::new(msg).wrap(Wrap { trim: false }).block(block);
            f.render_widget(p, cols[0]);
        } else {
            let items: Vec<ListItem> = self.lines.iter().map(|l| ListItem::new(styled_line(l))).collect();
            let list = List::new(items)
                .block(block)
                .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
                .highlight_symbol("> ");
            f.render_stateful_widget(list, cols[0], &mut self.list);
        }

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage(30),
                Constraint::Percentage(25),
                Constraint::Min(0),
            ])
            .split(cols[1]);

        let names: Vec<ListItem> = self
            .plugin_names
            .iter()
            .map(|n| ListItem::new(sanitize_inline(n, MAX_CELL_CHARS)))
            .collect();
        let names = List::new(names).block(
            Block::default()
                .title("Plugins")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
        f.render_widget(names, side[0]);

        let workflows: Vec<ListItem> = self
            .workflows
            .iter()
            .map(|n| ListItem::new(sanitize_inline(n, MAX_CELL_CHARS)))
            .collect();
        let workflows = List::new(workflows).block(
            Block::default()
                .title("Workflows")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
        f.render_widget(workflows, side[1]);

        let height = side[2].height.saturating_sub(2) as usize;
        let start = self.status.len().saturating_sub(height);
        let activity: Vec<Line> = self
            .status
            .iter()
            .skip(start)
            .map(|s| Line::from(sanitize_inline(s, MAX_CELL_CHARS)))
            .collect();
        let p = Paragraph::new(Text::from(activity)).block(
            Block::default()
                .title("Activity")
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded),
        );
        f.render_widget(p, side[2]);
    }

    fn draw_modal(&self, f: &mut ratatui::Frame) {
        let InputMode::ConfirmAction(action) = self.input else {
            return;
        };
        let area = centered_rect(50, 20, f.area());
        f.render_widget(Clear, area);
        let question = match action {
            RootAction::Shutdown => "Shut down the backend?".to_string(),
            other => format!("Run '{}' on the root instance?", other.label()),
        };
        let body = Text::from(vec![
            Line::from(question),
            Line::from(""),
            Line::from(Span::styled(
                "[y/Enter] Confirm  [n/Esc] Cancel",
                Style::default().fg(Color::Gray),
            )),
        ]);
        let p = Paragraph::new(body).wrap(Wrap { trim: false }).block(
            Block::default()
                .title("Confirm")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .style(Style::default().fg(Color::Yellow)),
        );
        f.render_widget(p, area);
    }
}

fn tone_color(tone: Option<BadgeTone>) -> Color {
    match tone {
        Some(BadgeTone::Primary) => Color::Blue,
        Some(BadgeTone::Success) => Color::Green,
        Some(BadgeTone::Warning) => Color::Yellow,
        Some(BadgeTone::Danger) => Color::Red,
        Some(BadgeTone::Info) => Color::Cyan,
        Some(BadgeTone::Secondary) => Color::Gray,
        None => Color::White,
    }
}

fn styled_line(line: &ViewLine) -> Line<'static> {
    let clean = |s: &str| sanitize_inline(s, MAX_CELL_CHARS);
    let mut spans = vec![Span::raw(" ".repeat(line.indent))];
    let label_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    match &line.kind {
        ViewLineKind::Header { header, .. } => {
            spans.push(Span::styled(
                clean(&header.name),
                Style::default().add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(
                format!(" [{}]", clean(&header.create_func)),
                Style::default().fg(Color::Gray),
            ));
            spans.push(Span::styled(
                format!(" ({})", clean(&header.state)),
                Style::default().fg(tone_color(header.badge)),
            ));
            spans.push(Span::styled(
                format!("  {}", header.toggle_label),
                Style::default().fg(Color::LightBlue),
            ));
        }
        ViewLineKind::BlockLabel(label) => {
            spans.push(Span::styled(format!("{}:", clean(label)), label_style));
        }
        ViewLineKind::ItemLabel(label) => {
            spans.push(Span::styled(label.clone(), Style::default().fg(Color::DarkGray)));
        }
        ViewLineKind::Input { label, value } => {
            spans.push(Span::styled(format!("{}: ", clean(label)), label_style));
            spans.push(Span::raw(format!("[{}]", clean(value))));
        }
        ViewLineKind::Select {
            label,
            options,
            pending,
        } => {
            spans.push(Span::styled(format!("{}: ", clean(label)), label_style));
            spans.push(Span::styled(
                select_summary(options, *pending),
                Style::default().fg(Color::Yellow),
            ));
        }
        ViewLineKind::Placeholder => {}
        ViewLineKind::EmptyConfig => {
            spans.push(Span::styled(
                "(no configuration)",
                Style::default().fg(Color::DarkGray),
            ));
        }
        ViewLineKind::Submit => {
            spans.push(Span::styled(
                format!("[{}]", Form::SUBMIT_LABEL),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }
    Line::from(spans)
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r)[1];
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical)[1]
}

pub fn run_tui(cfg: &DashboardConfig) -> Result<()> {
    let client = ApiClient::from_config(&cfg.server)?;
    info!(base_url = client.base_url(), "starting dashboard");

    let mut stdout = io::stdout();
    enable_raw_mode().map_err(|e| Error::msg(e.to_string()))?;
    execute!(stdout, EnterAlternateScreen, Hide).map_err(|e| Error::msg(e.to_string()))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| Error::msg(e.to_string()))?;
    terminal
        .clear()
        .map_err(|e| Error::msg(format!("tui clear failed: {e}")))?;

    let result = run_loop(&mut terminal, App::new(client, cfg));

    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen, Show).ok();
    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, mut app: App) -> Result<()> {
    let tick = Duration::from_millis(100);
    loop {
        if Instant::now() >= app.next_poll {
            app.request_refresh();
        }
        app.drain_events();
        app.rebuild_lines();

        terminal
            .draw(|f| app.draw(f))
            .map_err(|e| Error::msg(format!("draw failed: {e}")))?;

        if event::poll(tick).map_err(|e| Error::msg(e.to_string()))? {
            if let Event::Key(k) = event::read().map_err(|e| Error::msg(e.to_string()))? {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if app.handle_key(k.code, k.modifiers) {
                    break;
                }
            }
        }
    }
    Ok(())
}

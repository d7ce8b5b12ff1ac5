use crate::text::html_to_lines;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph, Wrap},
};
use std::time::Instant;
use studymark_core::viewer::{LoadOutcome, ViewerContent, fetch_document};
use studymark_core::{LinkActivation, StudySession};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

const PAGE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Sidebar,
    Links,
}

/// Interactive browser state: sidebar, document pane and link list.
pub struct Browser {
    session: StudySession,
    focus: Focus,
    selected_document: usize,
    selected_link: usize,
    scroll: usize,
    status: Option<String>,
    confirm_reset: bool,
    should_quit: bool,
    runtime: Handle,
    tx: mpsc::UnboundedSender<LoadOutcome>,
    rx: mpsc::UnboundedReceiver<LoadOutcome>,
}

impl Browser {
    pub fn new(session: StudySession, runtime: Handle) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            session,
            focus: Focus::Sidebar,
            selected_document: 0,
            selected_link: 0,
            scroll: 0,
            status: None,
            confirm_reset: false,
            should_quit: false,
            runtime,
            tx,
            rx,
        }
    }

    pub fn session(&self) -> &StudySession {
        &self.session
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn selected_document(&self) -> usize {
        self.selected_document
    }

    pub fn selected_link(&self) -> usize {
        self.selected_link
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn awaiting_reset_confirmation(&self) -> bool {
        self.confirm_reset
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Start fetching `path` in the background. The result arrives through
    /// [`Browser::process_messages`].
    pub fn request_load(&mut self, path: &str) {
        let (viewer, _) = self.session.viewer_and_store();
        viewer.begin_load(path);
        self.status = None;

        let source = self.session.source();
        let tx = self.tx.clone();
        let path = path.to_string();
        self.runtime.spawn(async move {
            let outcome = fetch_document(source.as_ref(), &path).await;
            // receiver gone means the browser was closed
            let _ = tx.send(outcome);
        });
    }

    /// Apply every finished load without blocking.
    pub fn process_messages(&mut self) {
        while let Ok(outcome) = self.rx.try_recv() {
            let (viewer, store) = self.session.viewer_and_store();
            if viewer.apply(outcome, store).is_ok() {
                self.selected_link = 0;
                self.scroll = 0;
                self.sync_sidebar();
            }
        }
    }

    /// Fire due auto-checks.
    pub fn tick(&mut self, now: Instant) {
        let checked = self.session.poll_auto_checks(now);
        if !checked.is_empty() {
            debug!("Auto-checked {} link(s)", checked.len());
        }
    }

    fn sync_sidebar(&mut self) {
        if let Some(active) = self.session.viewer().active()
            && let Some(index) = self
                .session
                .documents()
                .iter()
                .position(|doc| doc.path == active)
        {
            self.selected_document = index;
        }
    }

    fn link_count(&self) -> usize {
        self.session
            .viewer()
            .document()
            .map(|doc| doc.links.len())
            .unwrap_or(0)
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.confirm_reset {
            self.confirm_reset = false;
            if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                self.session.reset_progress();
                self.status = Some("All progress cleared".to_string());
            } else {
                self.status = Some("Reset cancelled".to_string());
            }
            return;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.focus = match self.focus {
                    Focus::Sidebar if self.link_count() > 0 => Focus::Links,
                    _ => Focus::Sidebar,
                };
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Enter => self.activate(),
            KeyCode::Char(' ') => {
                if self.focus == Focus::Links {
                    self.session.toggle(self.selected_link);
                }
            }
            KeyCode::Char('w') | KeyCode::Char('h') => {
                self.session.show_welcome();
                self.focus = Focus::Sidebar;
                self.scroll = 0;
                self.status = None;
            }
            KeyCode::Char('R') => {
                self.confirm_reset = true;
                self.status = Some("Clear all progress? [y/N]".to_string());
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_sub(PAGE);
            }
            KeyCode::PageDown => {
                self.scroll += PAGE;
            }
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let (selected, len) = match self.focus {
            Focus::Sidebar => (&mut self.selected_document, self.session.documents().len()),
            Focus::Links => {
                let len = self.link_count();
                (&mut self.selected_link, len)
            }
        };
        if len == 0 {
            return;
        }
        *selected = selected.saturating_add_signed(delta).min(len - 1);
    }

    fn activate(&mut self) {
        match self.focus {
            Focus::Sidebar => {
                if let Some(path) = self
                    .session
                    .documents()
                    .get(self.selected_document)
                    .map(|doc| doc.path.clone())
                {
                    self.request_load(&path);
                }
            }
            Focus::Links => match self.session.activate(self.selected_link, Instant::now()) {
                Some(LinkActivation::OpenDocument(path)) => {
                    self.focus = Focus::Sidebar;
                    self.request_load(&path);
                }
                Some(LinkActivation::Navigate(url)) => {
                    self.status = Some(format!("Open in browser: {}", url));
                }
                None => {}
            },
        }
    }

    pub fn render(&mut self, f: &mut Frame) {
        let vertical = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(f.area());

        let main = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
            .split(vertical[1]);

        self.render_header(f, vertical[0]);
        self.render_sidebar(f, main[0]);
        self.render_content(f, main[1]);
        self.render_hints(f, vertical[2]);
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let stats = self.session.global_stats();
        let title = match self.session.viewer().loading() {
            Some(path) => format!(" Progress | loading {} ", path),
            None => " Progress ".to_string(),
        };

        let gauge = Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .ratio(stats.ratio().clamp(0.0, 1.0))
            .label(format!("{}% ({}/{} links)", stats.percentage, stats.completed, stats.total));
        f.render_widget(gauge, area);
    }

    fn render_sidebar(&self, f: &mut Frame, area: Rect) {
        let border = if self.focus == Focus::Sidebar {
            Color::Yellow
        } else {
            Color::DarkGray
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" Documents ({}) ", self.session.documents().len()))
            .border_style(Style::default().fg(border));

        let inner = block.inner(area);
        f.render_widget(block, area);

        if self.session.documents().is_empty() {
            let empty = Paragraph::new("Unable to load file list")
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true });
            f.render_widget(empty, inner);
            return;
        }

        let active = self.session.viewer().active();
        let height = inner.height as usize;
        let offset = self.selected_document.saturating_sub(height.saturating_sub(1));

        let items: Vec<ListItem> = self
            .session
            .documents()
            .iter()
            .enumerate()
            .skip(offset)
            .take(height)
            .map(|(idx, doc)| {
                let stats = self.session.file_stats(&doc.path);
                let color = if stats.total > 0 && stats.completed == stats.total {
                    Color::Green
                } else {
                    Color::White
                };
                let mut style = Style::default().fg(color);
                if Some(doc.path.as_str()) == active {
                    style = style.add_modifier(Modifier::BOLD);
                }
                if idx == self.selected_document {
                    style = style.bg(Color::DarkGray);
                }

                ListItem::new(Line::from(vec![
                    Span::styled(doc.short_title.clone(), style),
                    Span::styled(
                        format!(" {}/{}", stats.completed, stats.total),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();

        f.render_widget(List::new(items), inner);
    }

    fn render_content(&mut self, f: &mut Frame, area: Rect) {
        let viewer = self.session.viewer();
        let title = match viewer.content() {
            ViewerContent::Welcome => " Welcome ".to_string(),
            ViewerContent::Document(doc) => format!(" {} ", doc.path),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::Cyan));

        let inner = block.inner(area);
        f.render_widget(block, area);

        let mut lines: Vec<Line> = Vec::new();
        if let Some(error) = viewer.error() {
            lines.push(Line::from(Span::styled(
                error.to_string(),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::default());
        }

        match viewer.content() {
            ViewerContent::Welcome => lines.extend(welcome_lines()),
            ViewerContent::Document(doc) => {
                lines.extend(html_to_lines(&doc.html()));
                if !doc.links.is_empty() {
                    lines.push(Line::default());
                    lines.push(Line::from(Span::styled(
                        format!("Links ({}/{} done)", doc.completed_count(), doc.links.len()),
                        Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                    )));
                    for (idx, link) in doc.links.iter().enumerate() {
                        let marker = if link.completed { "[x] " } else { "[ ] " };
                        let mut style = if link.completed {
                            Style::default().fg(Color::Green)
                        } else {
                            Style::default()
                        };
                        if self.focus == Focus::Links && idx == self.selected_link {
                            style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
                        }
                        lines.push(Line::from(vec![
                            Span::styled(marker, style),
                            Span::styled(link.text.clone(), style),
                            Span::styled(
                                format!("  {}", link.url),
                                Style::default().fg(Color::DarkGray),
                            ),
                        ]));
                    }
                }
            }
        }

        let height = inner.height as usize;
        let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
        let total = paragraph.line_count(inner.width);
        self.scroll = clamp_scroll(self.scroll, total, height);

        f.render_widget(paragraph.scroll((scroll_offset(self.scroll), 0)), inner);

        if total > height {
            render_scrollbar(f, area, total, height, self.scroll);
        }
    }

    fn render_hints(&self, f: &mut Frame, area: Rect) {
        let key = Style::default().fg(Color::Black).bg(Color::Gray);
        let mut spans = vec![
            Span::styled(" q ", key),
            Span::raw(" Quit  "),
            Span::styled(" Tab ", key),
            Span::raw(" Focus  "),
            Span::styled(" Enter ", key),
            Span::raw(" Open  "),
            Span::styled(" Space ", key),
            Span::raw(" Toggle  "),
            Span::styled(" w ", key),
            Span::raw(" Welcome  "),
            Span::styled(" R ", key),
            Span::raw(" Reset  "),
        ];
        if let Some(status) = &self.status {
            spans.push(Span::styled(
                status.clone(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ));
        }

        let paragraph =
            Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black).fg(Color::Gray));
        f.render_widget(paragraph, area);
    }
}

fn welcome_lines() -> Vec<Line<'static>> {
    let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    vec![
        Line::from(Span::styled("# Study Resources", heading)),
        Line::default(),
        Line::from("Select a document from the sidebar and press Enter to read it."),
        Line::from("Tab moves to the document's links. Space marks a link as done,"),
        Line::from("Enter opens it and marks it done shortly after."),
        Line::default(),
        Line::from("Progress is saved between sessions."),
    ]
}

/// Largest scroll that still fills the view, counted in wrapped rows.
fn clamp_scroll(scroll: usize, total_rows: usize, height: usize) -> usize {
    scroll.min(total_rows.saturating_sub(height))
}

fn scroll_offset(scroll: usize) -> u16 {
    u16::try_from(scroll).unwrap_or(u16::MAX)
}

fn render_scrollbar(f: &mut Frame, area: Rect, total_items: usize, visible_items: usize, scroll_offset: usize) {
    let scrollbar_height = area.height.saturating_sub(2) as usize;
    if scrollbar_height == 0 || total_items <= visible_items {
        return;
    }

    let thumb_size = ((visible_items as f32 / total_items as f32) * scrollbar_height as f32)
        .max(1.0)
        .floor() as usize;
    let scroll_ratio = scroll_offset as f32 / (total_items - visible_items) as f32;
    let thumb_position = (scroll_ratio * (scrollbar_height - thumb_size) as f32).floor() as usize;

    let scrollbar_x = area.x + area.width - 1;
    let scrollbar_start_y = area.y + 1;

    for i in 0..scrollbar_height {
        let in_thumb = i >= thumb_position && i < thumb_position + thumb_size;
        let (symbol, color) = if in_thumb {
            ("█", Color::Cyan)
        } else {
            ("│", Color::DarkGray)
        };
        f.render_widget(
            Paragraph::new(symbol).style(Style::default().fg(color)),
            Rect {
                x: scrollbar_x,
                y: scrollbar_start_y + i as u16,
                width: 1,
                height: 1,
            },
        );
    }
}

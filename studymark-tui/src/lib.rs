pub mod browser;
pub mod text;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io;
use std::time::{Duration, Instant};
use studymark_core::StudySession;
use tokio::runtime::Handle;

pub use browser::{Browser, Focus};

/// Run the study browser until the user quits.
///
/// Blocking; must be called from inside a tokio runtime, off the async
/// worker (for example through `tokio::task::block_in_place`). Fetches are
/// spawned onto that runtime.
pub fn run(session: StudySession) -> Result<()> {
    let runtime = Handle::try_current().context("the study browser needs a tokio runtime")?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut browser = Browser::new(session, runtime);
    let result = run_app(&mut terminal, &mut browser);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, browser: &mut Browser) -> Result<()> {
    loop {
        browser.process_messages();
        browser.tick(Instant::now());

        terminal.draw(|f| browser.render(f))?;

        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            browser.handle_key(key);
        }

        if browser.should_quit() {
            break;
        }
    }

    Ok(())
}

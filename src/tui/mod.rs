mod ui;
mod widgets;

use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::db::Database;
use crate::models::GradingMode;
use crate::session::{Session, SessionConfig, SystemClock};

pub struct App<'a> {
    pub session: Session<'a, Database, SystemClock, Database>,
    pub config: SessionConfig,
    /// Typed answer for the exact-match direction.
    pub input: String,
    pub should_quit: bool,
}

impl<'a> App<'a> {
    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        if self.session.is_done() {
            match key {
                KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => self.should_quit = true,
                _ => {}
            }
            return;
        }

        // Retry a blocked save from any state
        if key == KeyCode::Char('r') && modifiers.contains(KeyModifiers::CONTROL) {
            self.session.retry_save();
            return;
        }

        match self.session.grading_mode() {
            GradingMode::ExactMatch => self.handle_exact_match_key(key),
            GradingMode::SelfGraded => self.handle_self_graded_key(key),
        }
    }

    // Typing mode: most characters go into the answer, so only Esc quits.
    fn handle_exact_match_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => {
                if self.session.awaiting_finish() {
                    self.session.finish();
                } else {
                    let typed = std::mem::take(&mut self.input);
                    self.session.check_answer(&typed);
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => {
                self.input.push(c);
            }
            _ => {}
        }
    }

    fn handle_self_graded_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter | KeyCode::Char(' ') => {
                if self.session.awaiting_finish() {
                    self.session.finish();
                } else {
                    self.session.reveal();
                }
            }
            KeyCode::Char('y') => self.session.self_grade(true),
            KeyCode::Char('n') => self.session.self_grade(false),
            KeyCode::Char('f') => self.session.finish(),
            _ => {}
        }
    }
}

pub fn run(db: Database, config: SessionConfig) -> Result<(), Box<dyn std::error::Error>> {
    let clock = SystemClock;
    let session = Session::start(&db, &clock, &db, config.clone())?;
    let mut app = App {
        session,
        config,
        input: String::new(),
        should_quit: false,
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers);
            }
        }

        // One timer event per elapsed second, independent of key events.
        while last_tick.elapsed() >= Duration::from_secs(1) {
            app.session.tick();
            last_tick += Duration::from_secs(1);
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

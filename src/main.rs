pub mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::{Duration, Instant},
};
use tapwpm::{
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    history::{CsvHistoryStore, ScoreHistory, ScoreRecord},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    telemetry, Mode, Session, TapError, TextSource,
};
use tracing::{debug, error, info};

const TICK_RATE_MS: u64 = 100;

/// typing speed test with stopwatch and countdown modes
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// session mode
    #[clap(short = 'm', long, value_enum)]
    mode: Option<ModeArg>,

    /// number of seconds for countdown mode
    #[clap(short = 's', long)]
    secs: Option<u64>,

    /// custom prompt to use
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// file of short passages, one per line
    #[clap(long)]
    sentences: Option<PathBuf>,

    /// file of long passages, one per line
    #[clap(long)]
    long_texts: Option<PathBuf>,

    /// score history file
    #[clap(long)]
    scores: Option<PathBuf>,

    /// config file to read instead of the default location
    #[clap(long)]
    config: Option<PathBuf>,

    /// print the top scores and exit
    #[clap(long)]
    history: bool,

    /// save a custom passage and exit
    #[clap(long, value_name = "TEXT")]
    add_text: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ModeArg {
    Stopwatch,
    Countdown,
}

impl Cli {
    /// Layer command line flags over the stored configuration
    fn apply(&self, mut config: Config) -> Config {
        if let Some(mode) = self.mode {
            config.mode = match mode {
                ModeArg::Stopwatch => Mode::Stopwatch,
                ModeArg::Countdown => Mode::countdown(),
            };
        }
        if let Some(secs) = self.secs {
            config.countdown_secs = secs;
        }
        if let Some(path) = &self.sentences {
            config.sentences_path = Some(path.clone());
        }
        if let Some(path) = &self.long_texts {
            config.long_texts_path = Some(path.clone());
        }
        if let Some(path) = &self.scores {
            config.scores_path = path.clone();
        }
        config
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AppState {
    Menu,
    Typing,
    Results,
    History,
    AddText,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug)]
pub struct App {
    pub state: AppState,
    pub config: Config,
    pub texts: TextSource,
    pub history: ScoreHistory<CsvHistoryStore>,
    /// Menu selection: 0 is a random passage, `i` is sentence `i - 1`.
    pub selected: usize,
    pub custom_prompt: Option<String>,
    pub session: Option<Session>,
    /// Outcome of saving the last result, `None` when it missed the top 5
    pub last_record: Option<ScoreRecord>,
    pub message: Option<String>,
    /// Custom passage being typed on the add-text screen
    pub draft: String,
    /// Clock reading of the most recent event, used for rendering
    pub now: Instant,
}

impl App {
    pub fn new(config: Config, texts: TextSource, custom_prompt: Option<String>) -> Self {
        let history = ScoreHistory::open(CsvHistoryStore::with_path(&config.scores_path));
        info!(
            high_score = history.high_score(),
            "application started"
        );

        Self {
            state: AppState::Menu,
            config,
            texts,
            history,
            selected: 0,
            custom_prompt,
            session: None,
            last_record: None,
            message: None,
            draft: String::new(),
            now: Instant::now(),
        }
    }

    /// Number of menu entries: "Random" plus every sentence
    pub fn menu_len(&self) -> usize {
        self.texts.sentences().len() + 1
    }

    pub fn begin(&mut self, passage: String, mode: Mode) {
        match Session::new(passage, mode) {
            Ok(session) => {
                debug!(%mode, "typing test started");
                self.session = Some(session);
                self.last_record = None;
                self.message = None;
                self.state = AppState::Typing;
            }
            Err(e) => {
                error!("could not start session: {e}");
                self.message = Some(e.to_string());
                self.state = AppState::Menu;
            }
        }
    }

    fn begin_random(&mut self, mode: Mode) {
        let passage = match &self.custom_prompt {
            Some(prompt) => prompt.clone(),
            None => self.texts.random(mode),
        };
        self.begin(passage, mode);
    }

    fn begin_selected(&mut self) {
        let mode = self.config.session_mode();
        match self.selected.checked_sub(1).and_then(|i| self.texts.sentence(i)) {
            Some(text) => self.begin(text.to_string(), mode),
            None => self.begin_random(mode),
        }
    }

    /// Record a finished session and move to the results screen
    fn complete(&mut self) {
        let Some(result) = self.session.as_ref().and_then(|s| s.result().copied()) else {
            return;
        };
        match self.history.record(&result) {
            Ok(record) => self.last_record = record,
            Err(e) => {
                error!("failed to save score: {e}");
                self.message = Some(format!("score not saved: {e}"));
            }
        }
        self.state = AppState::Results;
    }

    fn handle_session<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Session) -> Result<Option<tapwpm::SessionResult>, TapError>,
    {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match f(session) {
            Ok(Some(_)) => self.complete(),
            Ok(None) => {}
            Err(e) => {
                error!("session aborted: {e}");
                self.session = None;
                self.message = Some(e.to_string());
                self.state = AppState::Menu;
            }
        }
    }

    fn leave_session(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.leave();
        }
        self.back_to_menu();
    }

    fn back_to_menu(&mut self) {
        self.message = None;
        self.state = AppState::Menu;
    }

    /// Save the draft as a custom passage and report the outcome on the menu
    fn save_draft(&mut self) {
        let draft = std::mem::take(&mut self.draft);
        self.message = Some(match self.texts.add_custom(&draft) {
            Ok(true) => "Custom text added.".to_string(),
            Ok(false) => "This text already exists!".to_string(),
            Err(e) => {
                error!("could not add custom text: {e}");
                e.to_string()
            }
        });
        self.state = AppState::Menu;
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.now = now;
        if self.state == AppState::Typing {
            self.handle_session(|s| s.tick(now));
        }
    }

    /// Whether the screen changes on its own between key presses
    pub fn needs_tick(&self) -> bool {
        self.state == AppState::Typing && self.session.as_ref().is_some_and(Session::needs_tick)
    }

    pub fn on_key(&mut self, key: KeyEvent, now: Instant) -> Flow {
        self.now = now;
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.leave_session();
            return Flow::Quit;
        }

        match self.state {
            AppState::Menu => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => return Flow::Quit,
                KeyCode::Char('s') => self.begin_random(Mode::Stopwatch),
                KeyCode::Char('c') => self.begin_random(Mode::Countdown {
                    duration_secs: self.config.countdown_secs,
                }),
                KeyCode::Char('h') => self.state = AppState::History,
                KeyCode::Char('a') => {
                    self.draft.clear();
                    self.message = None;
                    self.state = AppState::AddText;
                }
                KeyCode::Up => self.selected = self.selected.saturating_sub(1),
                KeyCode::Down => {
                    if self.selected + 1 < self.menu_len() {
                        self.selected += 1;
                    }
                }
                KeyCode::Enter => self.begin_selected(),
                _ => {}
            },
            AppState::Typing => match key.code {
                KeyCode::Esc => self.leave_session(),
                KeyCode::Enter => self.handle_session(|s| s.submit(now)),
                KeyCode::Backspace => {
                    if let Some(session) = self.session.as_mut() {
                        session.backspace();
                    }
                }
                KeyCode::Char(c) => self.handle_session(|s| s.write(c, now)),
                _ => {}
            },
            AppState::Results => match key.code {
                KeyCode::Char('r') => {
                    if let Some(session) = self.session.take() {
                        self.begin(session.passage().to_string(), session.mode());
                    }
                }
                KeyCode::Char('n') => {
                    let mode = self
                        .session
                        .as_ref()
                        .map_or(self.config.session_mode(), Session::mode);
                    self.begin_random(mode);
                }
                KeyCode::Char('h') => self.state = AppState::History,
                KeyCode::Esc | KeyCode::Char('b') => self.back_to_menu(),
                _ => {}
            },
            AppState::History => match key.code {
                KeyCode::Esc | KeyCode::Char('b') | KeyCode::Backspace => self.back_to_menu(),
                _ => {}
            },
            AppState::AddText => match key.code {
                KeyCode::Esc => {
                    self.draft.clear();
                    self.back_to_menu();
                }
                KeyCode::Enter => self.save_draft(),
                KeyCode::Backspace => {
                    self.draft.pop();
                }
                KeyCode::Char(c) => self.draft.push(c),
                _ => {}
            },
        }
        Flow::Continue
    }
}

fn print_history(history: &ScoreHistory<CsvHistoryStore>) {
    if history.is_empty() {
        println!("No history yet.");
        return;
    }
    println!("{:>4}  {:>14}  {:>8}  {:>12}", "rank", "time taken (s)", "wpm", "accuracy (%)");
    for (rank, record) in history.records().iter().enumerate() {
        println!(
            "{:>4}  {:>14.2}  {:>8.2}  {:>12.2}",
            rank + 1,
            record.elapsed_secs,
            record.wpm,
            record.accuracy
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Err(e) = telemetry::init(&AppDirs::log_dir()) {
        eprintln!("logging disabled: {e}");
    }

    let store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let config = cli.apply(store.load());

    if cli.history {
        print_history(&ScoreHistory::open(CsvHistoryStore::with_path(
            &config.scores_path,
        )));
        return Ok(());
    }

    let mut texts = TextSource::load(
        config.sentences_path.as_deref(),
        config.long_texts_path.as_deref(),
        &config.custom_texts_path,
    )?;

    if let Some(text) = &cli.add_text {
        if texts.add_custom(text)? {
            println!("Custom text added.");
        } else {
            println!("This text already exists!");
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut app = App::new(config, texts, cli.prompt.clone());
    if let Some(prompt) = cli.prompt {
        let mode = app.config.session_mode();
        app.begin(prompt, mode);
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let outcome = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    outcome
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );

    terminal.draw(|f| ui(app, f))?;

    loop {
        match runner.step() {
            AppEvent::Tick => {
                // nothing is scheduled once the countdown is cancelled or done
                if app.needs_tick() {
                    app.on_tick(Instant::now());
                    terminal.draw(|f| ui(app, f))?;
                }
            }
            AppEvent::Resize => {
                terminal.draw(|f| ui(app, f))?;
            }
            AppEvent::Key(key) => {
                if app.on_key(key, Instant::now()) == Flow::Quit {
                    break;
                }
                terminal.draw(|f| ui(app, f))?;
            }
        }
    }

    info!("application closed");
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

mod ui;

use std::{
    error::Error,
    fs,
    io::{self, stdin, Write},
    path::PathBuf,
    time::{Duration, Instant},
};

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    event::{DisableBracketedPaste, EnableBracketedPaste, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use keyglow::{
    config::{Config, ConfigStore, FileConfigStore},
    content,
    lighting::{
        HttpLightingClient, LedColor, LightCommand, LightingBackend, LightingClient, LightingMode,
        NullLightingClient,
    },
    logging,
    practice::{Flow, Practice},
    runtime::{key_name, AppEvent, CrosstermEventSource, EventSource, FixedTicker, Runner, Ticker},
    session::Viewport,
    settings::{FontSize, Settings},
    stats::{TimingStats, DEFAULT_CSV_NAME},
    store::{KeyValueStore, SqliteStore},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};

const TICK_RATE_MS: u64 = 33;

/// type along with your keyboard: the next key lights up as you go
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Typing practice that lights the next key to press on an RGB keyboard through a local lighting service, and keeps per-letter timing stats."
)]
pub struct Cli {
    /// build segments from this file and start practicing right away
    #[clap(long, value_name = "PATH")]
    text_file: Option<PathBuf>,

    /// base url of the lighting service
    #[clap(long, value_name = "URL")]
    backend: Option<String>,

    /// light single keys or whole regions
    #[clap(long, value_enum)]
    mode: Option<LightingMode>,

    /// led color as #RRGGBB
    #[clap(long)]
    color: Option<LedColor>,

    /// pause between turning a key off and lighting the next, 0 disables
    #[clap(long, value_name = "MS")]
    relight_delay_ms: Option<u64>,

    /// do not talk to the lighting service
    #[clap(long)]
    no_lights: bool,

    /// log filter, e.g. debug or keyglow=trace
    #[clap(long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// print per-letter timing stats
    Stats {
        /// write the stats as csv instead
        #[clap(long, value_name = "PATH")]
        csv: Option<PathBuf>,
    },
    /// forget the saved practice text
    Reset,
    /// forget all timing stats
    ResetStats,
    /// turn every key light off
    LightsOff,
    /// light a single key, to check the service
    Light { key: char },
    /// run the lighting service's self test
    Diagnose,
}

impl Cli {
    /// Fold connection options into `config`; true if anything changed.
    fn apply_to(&self, config: &mut Config) -> bool {
        let before = config.clone();
        if let Some(url) = &self.backend {
            config.backend_url = url.trim_end_matches('/').to_string();
        }
        if let Some(ms) = self.relight_delay_ms {
            config.relight_delay_ms = ms;
        }
        *config != before
    }

    /// Fold display options into the stored settings.
    fn apply_settings(&self, store: &dyn KeyValueStore) {
        if self.mode.is_none() && self.color.is_none() {
            return;
        }
        let mut settings = Settings::load(store);
        if let Some(mode) = self.mode {
            settings.lighting_mode = mode;
        }
        if let Some(color) = &self.color {
            settings.led_color = color.clone();
        }
        settings.save(store);
    }
}

pub type AppPractice = Practice<Box<dyn KeyValueStore>, Box<dyn LightingClient>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Input,
    Display,
    Success,
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
    Settings,
    FullText,
}

pub struct App {
    pub practice: AppPractice,
    pub state: AppState,
    pub modal: Option<Modal>,
    /// Text typed or pasted on the input screen
    pub input: String,
    pub stats_scroll: usize,
    /// One-line message for the footer
    pub status: Option<String>,
    pub quit: bool,
}

impl App {
    pub fn new(mut practice: AppPractice, now: Instant) -> Self {
        let state = if practice.resume(now) {
            AppState::Display
        } else {
            AppState::Input
        };
        let input = practice.session().segments().join("\n");
        Self {
            practice,
            state,
            modal: None,
            input,
            stats_scroll: 0,
            status: None,
            quit: false,
        }
    }

    pub fn on_paste(&mut self, text: &str) {
        if self.state == AppState::Input {
            self.input.push_str(text);
        }
    }

    pub fn on_key(&mut self, key: KeyEvent, now: Instant) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            self.quit = true;
            return;
        }
        self.status = None;

        match self.state {
            AppState::Input => self.on_input_key(key, ctrl, now),
            AppState::Display => match self.modal {
                Some(modal) => self.on_modal_key(modal, key),
                None => self.on_display_key(key, ctrl, now),
            },
            AppState::Success => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                    self.state = AppState::Input;
                }
            }
            AppState::Stats => self.on_stats_key(key),
        }
    }

    fn on_input_key(&mut self, key: KeyEvent, ctrl: bool, now: Instant) {
        match key.code {
            KeyCode::Esc => self.quit = true,
            KeyCode::Char('s') if ctrl => {
                if self.practice.start_from_text(&self.input, now) > 0 {
                    self.state = AppState::Display;
                } else {
                    self.status = Some("nothing to practice, type or paste some text".into());
                }
            }
            KeyCode::Char('l') if ctrl => {
                self.input.clear();
                self.practice.reset();
            }
            KeyCode::Char('t') if ctrl => {
                self.stats_scroll = 0;
                self.state = AppState::Stats;
            }
            KeyCode::Char(c) if !ctrl => self.input.push(c),
            KeyCode::Enter => self.input.push('\n'),
            KeyCode::Backspace => {
                self.input.pop();
            }
            _ => {}
        }
    }

    fn on_display_key(&mut self, key: KeyEvent, ctrl: bool, now: Instant) {
        match key.code {
            KeyCode::Esc => {
                self.practice.lights_off();
                self.state = AppState::Input;
            }
            KeyCode::F(2) => self.modal = Some(Modal::Settings),
            KeyCode::F(3) => self.modal = Some(Modal::FullText),
            KeyCode::Char('p') if ctrl => self.practice.retreat(now),
            KeyCode::Enter if self.practice.session().is_completed() => {
                if self.practice.advance(now) == Flow::Finished {
                    self.practice.lights_off();
                    self.state = AppState::Success;
                }
            }
            _ if !ctrl => {
                self.practice.on_key(&key_name(&key), now);
            }
            _ => {}
        }
    }

    fn on_modal_key(&mut self, modal: Modal, key: KeyEvent) {
        match (modal, key.code) {
            (_, KeyCode::Esc) | (Modal::Settings, KeyCode::F(2)) | (Modal::FullText, KeyCode::F(3)) => {
                self.modal = None
            }
            (Modal::Settings, KeyCode::Char(c @ '1'..='3')) => {
                let index = c as usize - '1' as usize;
                self.practice.set_font_size(FontSize::ALL[index]);
            }
            (Modal::Settings, KeyCode::Char('m')) => {
                let mode = self.practice.settings().lighting_mode.toggled();
                self.practice.set_lighting_mode(mode);
            }
            (Modal::Settings, KeyCode::Char('c')) => {
                let color = self.practice.settings().led_color.next_preset();
                self.practice.set_led_color(color);
            }
            _ => {}
        }
    }

    fn on_stats_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Backspace => self.state = AppState::Input,
            KeyCode::Char('e') => {
                self.status = Some(match self.practice.export_stats(DEFAULT_CSV_NAME) {
                    Ok(()) => format!("stats exported to {DEFAULT_CSV_NAME}"),
                    Err(e) => {
                        log::warn!("stats export failed: {e}");
                        format!("export failed: {e}")
                    }
                });
            }
            KeyCode::Char('r') => {
                self.practice.reset_stats();
                self.stats_scroll = 0;
                self.status = Some("stats cleared".into());
            }
            KeyCode::Up => self.stats_scroll = self.stats_scroll.saturating_sub(1),
            KeyCode::Down => self.stats_scroll += 1,
            KeyCode::PageUp => self.stats_scroll = self.stats_scroll.saturating_sub(10),
            KeyCode::PageDown => self.stats_scroll += 10,
            KeyCode::Home => self.stats_scroll = 0,
            _ => {}
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match logging::init(cli.log_level.as_deref()) {
        Ok(path) => log::info!("keyglow starting, logging to {}", path.display()),
        Err(e) => eprintln!("logging disabled: {e}"),
    }

    let config_store = FileConfigStore::new();
    let mut config = config_store.load();
    if cli.apply_to(&mut config) {
        if let Err(e) = config_store.save(&config) {
            log::warn!("could not save config to {}: {}", config_store.path().display(), e);
        }
    }

    let store = SqliteStore::open_default()?;
    cli.apply_settings(&store);

    if let Some(command) = &cli.command {
        return run_command(command, &store, &config);
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let text = cli.text_file.as_ref().map(fs::read_to_string).transpose()?;

    let lights: Box<dyn LightingClient> = if cli.no_lights || !config.lights_enabled {
        log::info!("lighting disabled");
        Box::new(NullLightingClient)
    } else {
        Box::new(HttpLightingClient::spawn(
            &config.backend_url,
            config.request_timeout(),
        )?)
    };

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    let store: Box<dyn KeyValueStore> = Box::new(store);
    let mut practice = Practice::new(
        store,
        lights,
        config.relight_delay(),
        Viewport::new(size.width, size.height),
    );
    let now = Instant::now();
    if let Some(text) = &text {
        practice.start_from_text(text, now);
    }
    let mut app = App::new(practice, now);

    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = start_tui(&mut terminal, &mut app, &runner);

    app.practice.lights_off();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: EventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    let mut last_tick = Instant::now();
    terminal.draw(|f| ui::draw(app, f))?;

    while !app.quit {
        match runner.step() {
            AppEvent::Tick => {
                let now = Instant::now();
                let dt = now.duration_since(last_tick).as_secs_f64();
                last_tick = now;

                // only the animation changes between keystrokes
                if app.practice.overlay().is_active() {
                    app.practice.tick(dt);
                    terminal.draw(|f| ui::draw(app, f))?;
                }
            }
            AppEvent::Resize(width, height) => {
                app.practice.resize(width, height);
                terminal.draw(|f| ui::draw(app, f))?;
            }
            AppEvent::Paste(text) => {
                app.on_paste(&text);
                terminal.draw(|f| ui::draw(app, f))?;
            }
            AppEvent::Key(key) => {
                app.on_key(key, Instant::now());
                terminal.draw(|f| ui::draw(app, f))?;
            }
        }
    }

    Ok(())
}

fn run_command(
    command: &Command,
    store: &dyn KeyValueStore,
    config: &Config,
) -> Result<(), Box<dyn Error>> {
    let mut out = io::stdout().lock();
    match command {
        Command::Stats { csv: Some(path) } => {
            TimingStats::load(store).export_csv(path)?;
            writeln!(out, "stats exported to {}", path.display())?;
        }
        Command::Stats { csv: None } => print_stats(&TimingStats::load(store), &mut out)?,
        Command::Reset => {
            content::clear(store);
            writeln!(out, "saved practice text cleared")?;
        }
        Command::ResetStats => {
            TimingStats::load(store).clear(store);
            writeln!(out, "timing stats cleared")?;
        }
        Command::LightsOff => {
            backend(config)?.execute(&LightCommand::AllOff)?;
        }
        Command::Light { key } => {
            let settings = Settings::load(store);
            let command = LightCommand::light(settings.lighting_mode, *key, &settings.led_color);
            backend(config)?.execute(&command)?;
            writeln!(out, "lit {key:?} with {}", settings.led_color)?;
        }
        Command::Diagnose => {
            let report = backend(config)?.run_test()?;
            writeln!(out, "STDOUT:\n{}", report.stdout)?;
            writeln!(out, "STDERR:\n{}", report.stderr)?;
            if let Some(code) = report.returncode {
                writeln!(out, "exit code {code}")?;
            }
        }
    }
    Ok(())
}

fn backend(config: &Config) -> Result<LightingBackend, Box<dyn Error>> {
    Ok(LightingBackend::new(
        &config.backend_url,
        config.request_timeout(),
    )?)
}

fn print_stats<W: Write>(stats: &TimingStats, out: &mut W) -> io::Result<()> {
    let rows = stats.summary();
    if rows.is_empty() {
        return writeln!(out, "no timing stats yet");
    }
    writeln!(out, "{:<8} {:>6} {:>8}  Samples (last 10)", "Letter", "Count", "Avg(ms)")?;
    for row in rows {
        let avg = row.avg_ms.map(|a| a.to_string()).unwrap_or_default();
        let recent = row
            .recent
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "{:<8} {:>6} {:>8}  {}", row.letter, row.count, avg, recent)?;
    }
    if let Some(avg) = stats.overall_avg_ms() {
        writeln!(out, "overall average {avg} ms")?;
    }
    Ok(())
}

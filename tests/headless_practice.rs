use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use keyglow::content;
use keyglow::lighting::{LedColor, LightCommand, LightingMode, RecordingLightingClient};
use keyglow::practice::{Flow, Practice};
use keyglow::runtime::{key_name, AppEvent, FixedTicker, Runner, TestEventSource};
use keyglow::session::Viewport;
use keyglow::stats::TimingStats;
use keyglow::store::{MemoryStore, SqliteStore};

fn key(c: char) -> AppEvent {
    AppEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
}

// Drives a practice run from scripted terminal events, without a TTY
#[test]
fn headless_practice_flow_completes() {
    let store = MemoryStore::new();
    let lights = RecordingLightingClient::new();
    let mut practice = Practice::new(
        &store,
        lights.clone(),
        Duration::ZERO,
        Viewport::new(80, 24),
    );
    practice.start_from_text("cat", Instant::now());

    let (tx, rx) = mpsc::channel();
    for c in ['x', 'c', 'a', 't'] {
        tx.send(key(c)).unwrap();
    }
    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    for _ in 0..100u32 {
        match runner.step() {
            AppEvent::Tick => practice.tick(0.005),
            AppEvent::Key(k) => {
                practice.on_key(&key_name(&k), Instant::now());
                if practice.session().is_completed() {
                    break;
                }
            }
            AppEvent::Resize(w, h) => practice.resize(w, h),
            AppEvent::Paste(_) => {}
        }
    }

    assert!(practice.session().is_completed());
    assert_eq!(practice.session().cursor(), 3);
    assert_eq!(practice.overlay().bursts().len(), 5);

    let green = LedColor::default();
    let mode = LightingMode::Individual;
    let sent: Vec<LightCommand> = lights
        .sent()
        .into_iter()
        .filter(|c| *c != LightCommand::AllOff)
        .collect();
    assert_eq!(
        sent,
        vec![
            LightCommand::light(mode, 'c', &green),
            LightCommand::unlight(mode, 'c'),
            LightCommand::light(mode, 'a', &green),
            LightCommand::unlight(mode, 'a'),
            LightCommand::light(mode, 't', &green),
            LightCommand::unlight(mode, 't'),
        ]
    );

    // one sample per accepted key, none for the miss
    let stats = TimingStats::load(&store);
    assert_eq!(stats.intervals().len(), 3);
    assert_eq!(stats.samples_for('x'), Vec::<f64>::new());
    assert_eq!(practice.advance(Instant::now()), Flow::Finished);
}

#[test]
fn headless_relight_settles_between_keys() {
    let store = MemoryStore::new();
    let lights = RecordingLightingClient::new();
    let mut practice = Practice::new(
        &store,
        lights.clone(),
        Duration::from_millis(30),
        Viewport::default(),
    );
    practice.start_from_text("ab", Instant::now());
    lights.clear();

    practice.on_key("a", Instant::now());
    assert_eq!(
        lights.sent(),
        vec![
            LightCommand::KeyOff { key: 'a' },
            LightCommand::Settle(Duration::from_millis(30)),
            LightCommand::light(LightingMode::Individual, 'b', &LedColor::default()),
        ]
    );
}

// Progress survives a restart when backed by the sqlite store
#[test]
fn sqlite_backed_progress_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("state").join("keyglow.db");
    let text = "first line\nsecond line\n\nthird line";

    {
        let store = SqliteStore::open(&db).unwrap();
        let mut practice = Practice::new(
            &store,
            RecordingLightingClient::new(),
            Duration::ZERO,
            Viewport::default(),
        );
        assert_eq!(practice.start_from_text(text, Instant::now()), 3);
        for c in "first line".chars() {
            practice.on_key(&c.to_string(), Instant::now());
        }
        assert_eq!(practice.advance(Instant::now()), Flow::Continue);
    }

    let store = SqliteStore::open(&db).unwrap();
    assert_eq!(content::load(&store).index, 1);

    let lights = RecordingLightingClient::new();
    let mut practice = Practice::new(&store, lights.clone(), Duration::ZERO, Viewport::default());
    assert!(practice.resume(Instant::now()));
    assert_eq!(practice.session().current_segment(), "second line");
    assert_eq!(
        lights.sent(),
        vec![LightCommand::light(
            LightingMode::Individual,
            's',
            &LedColor::default()
        )]
    );
    assert_eq!(practice.stats().intervals().len(), 10);
}

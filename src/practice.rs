//! Carries out what the typing session asks for.
//!
//! [`Practice`] owns the session together with its collaborators and turns
//! each returned [`Effect`] into a lighting command, a stats update, a
//! firework or a saved index.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::content;
use crate::fireworks::FireworkOverlay;
use crate::lighting::{LedColor, LightCommand, LightingClient, LightingMode};
use crate::segmenter::build_segments;
use crate::session::{Effect, LightingProfile, Phase, TypingSession, Viewport};
use crate::settings::{FontSize, Settings};
use crate::stats::TimingStats;
use crate::store::KeyValueStore;

/// What the caller should show after an advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Finished,
}

pub struct Practice<S: KeyValueStore, L: LightingClient> {
    store: S,
    lights: L,
    session: TypingSession,
    settings: Settings,
    stats: TimingStats,
    overlay: FireworkOverlay,
    relight_delay: Duration,
    progress: f64,
}

impl<S: KeyValueStore, L: LightingClient> Practice<S, L> {
    /// Restore settings, stats and saved content; nothing is loaded yet.
    pub fn new(store: S, lights: L, relight_delay: Duration, viewport: Viewport) -> Self {
        let settings = Settings::load(&store);
        let stats = TimingStats::load(&store);
        let saved = content::load(&store);
        let profile = LightingProfile {
            mode: settings.lighting_mode,
            color: settings.led_color.clone(),
            relight_delay,
        };
        let session = TypingSession::new(saved.segments, profile, viewport);

        let practice = Self {
            store,
            lights,
            session,
            settings,
            stats,
            overlay: FireworkOverlay::new(viewport.height),
            relight_delay,
            progress: 0.0,
        };
        practice.bind_region_color();
        practice
    }

    pub fn session(&self) -> &TypingSession {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> &TimingStats {
        &self.stats
    }

    pub fn overlay(&self) -> &FireworkOverlay {
        &self.overlay
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn lights(&self) -> &L {
        &self.lights
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn has_content(&self) -> bool {
        !self.session.segments().is_empty()
    }

    /// Build segments from raw text, save them and load the first.
    ///
    /// Returns the number of segments; blank text leaves everything as is.
    pub fn start_from_text(&mut self, text: &str, now: Instant) -> usize {
        let segments = build_segments(text);
        if segments.is_empty() {
            return 0;
        }
        log::info!("starting practice with {} segments", segments.len());
        content::save_segments(&self.store, &segments);

        let count = segments.len();
        let effects = self.session.reset();
        self.apply(effects);
        self.session = TypingSession::new(segments, self.profile(), self.session.viewport());
        let effects = self.session.load_segment(0, now);
        self.apply(effects);
        count
    }

    /// Load the saved segment unless one is already loaded.
    pub fn resume(&mut self, now: Instant) -> bool {
        if !self.has_content() {
            return false;
        }
        if self.session.phase() == Phase::Idle {
            let index = content::load(&self.store).index;
            let effects = self.session.load_segment(index, now);
            self.apply(effects);
        }
        true
    }

    /// Returns whether the key advanced the cursor.
    pub fn on_key(&mut self, key: &str, now: Instant) -> bool {
        let keystroke = self.session.handle_keystroke(key, now);
        self.apply(keystroke.effects);
        keystroke.accepted
    }

    pub fn advance(&mut self, now: Instant) -> Flow {
        let before = self.session.segment_index();
        let effects = self.session.advance_segment(now);
        let finished = effects.contains(&Effect::SessionComplete);
        self.apply(effects);
        if self.session.segment_index() != before {
            content::save_index(&self.store, self.session.segment_index());
        }
        if finished {
            log::info!("all segments completed");
            Flow::Finished
        } else {
            Flow::Continue
        }
    }

    pub fn retreat(&mut self, now: Instant) {
        let before = self.session.segment_index();
        let effects = self.session.retreat_segment(now);
        self.apply(effects);
        if self.session.segment_index() != before {
            content::save_index(&self.store, self.session.segment_index());
        }
    }

    /// Forget the content and its progress, here and in storage.
    pub fn reset(&mut self) {
        let effects = self.session.reset();
        self.apply(effects);
        self.overlay.clear();
        content::clear(&self.store);
        log::info!("practice content cleared");
    }

    pub fn reset_stats(&mut self) {
        self.stats.clear(&self.store);
    }

    pub fn export_stats<P: AsRef<Path>>(&self, path: P) -> Result<(), csv::Error> {
        self.stats.export_csv(path)
    }

    /// Advance the animation by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        if self.overlay.is_active() {
            self.overlay.advance(dt);
        }
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        let viewport = Viewport::new(width, height);
        self.session.set_viewport(viewport);
        self.overlay.set_viewport_height(viewport.height);
    }

    pub fn set_font_size(&mut self, size: FontSize) {
        self.settings.font_size = size;
        self.settings.save(&self.store);
    }

    pub fn set_lighting_mode(&mut self, mode: LightingMode) {
        if mode == self.settings.lighting_mode {
            return;
        }
        self.switch_lighting(|settings| settings.lighting_mode = mode);
        self.bind_region_color();
    }

    pub fn set_led_color(&mut self, color: LedColor) {
        self.switch_lighting(|settings| settings.led_color = color);
        self.bind_region_color();
    }

    /// Turn the lights off, e.g. before quitting
    pub fn lights_off(&self) {
        self.lights.send(LightCommand::AllOff);
    }

    fn switch_lighting(&mut self, change: impl FnOnce(&mut Settings)) {
        // unlight with the old settings so nothing stays lit after the switch
        let lit = match self.session.phase() {
            Phase::AwaitingInput => self.session.expected_char(),
            _ => None,
        };
        if let Some(key) = lit {
            self.lights
                .send(LightCommand::unlight(self.settings.lighting_mode, key));
        }

        change(&mut self.settings);
        self.settings.save(&self.store);
        self.session.set_lighting(self.profile());

        if let Some(key) = lit {
            if !self.relight_delay.is_zero() {
                self.lights.send(LightCommand::Settle(self.relight_delay));
            }
            self.lights.send(LightCommand::light(
                self.settings.lighting_mode,
                key,
                &self.settings.led_color,
            ));
        }
    }

    fn bind_region_color(&self) {
        if self.settings.lighting_mode == LightingMode::Region {
            self.lights.send(LightCommand::BindRegionsColor {
                color: self.settings.led_color.clone(),
            });
        }
    }

    fn profile(&self) -> LightingProfile {
        LightingProfile {
            mode: self.settings.lighting_mode,
            color: self.settings.led_color.clone(),
            relight_delay: self.relight_delay,
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        let mut stats_changed = false;
        for effect in effects {
            match effect {
                Effect::Light(command) => self.lights.send(command),
                Effect::Progress(p) => self.progress = p,
                Effect::RecordTiming(sample) => {
                    self.stats.record(sample);
                    stats_changed = true;
                }
                Effect::Celebrate(targets) => self.overlay.celebrate(&targets),
                Effect::SessionComplete => {}
            }
        }
        if stats_changed {
            self.stats.save(&self.store);
        }
    }
}

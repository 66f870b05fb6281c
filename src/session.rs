//! The typing session state machine.
//!
//! [`TypingSession`] never performs I/O. Every operation returns the
//! [`Effect`]s the caller should carry out: lighting commands, progress
//! updates, timing samples, a celebration, or the end of the session.

use std::time::{Duration, Instant};

use crate::lighting::{LedColor, LightCommand, LightingMode};
use crate::stats::KeyTimingSample;

/// Celebration targets, in cells, relative to the top-center anchor
const CELEBRATION_OFFSETS: [(f64, f64); 5] = [
    (0.0, 0.0),
    (-20.0, 2.0),
    (20.0, 2.0),
    (-15.0, -2.0),
    (15.0, -2.0),
];
/// Anchor height as a fraction of the viewport
const CELEBRATION_ANCHOR_Y: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::new(80, 24)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CelebrationTarget {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Light(LightCommand),
    /// Fraction of the current segment typed, 0.0..=1.0
    Progress(f64),
    RecordTiming(KeyTimingSample),
    Celebrate(Vec<CelebrationTarget>),
    /// No segment left to advance to
    SessionComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No segment loaded yet
    Idle,
    AwaitingInput,
    Completed,
}

/// How the lights follow the cursor
#[derive(Debug, Clone, PartialEq)]
pub struct LightingProfile {
    pub mode: LightingMode,
    pub color: LedColor,
    pub relight_delay: Duration,
}

impl Default for LightingProfile {
    fn default() -> Self {
        Self {
            mode: LightingMode::default(),
            color: LedColor::default(),
            relight_delay: Duration::from_millis(30),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub segments: Vec<String>,
    pub segment_index: usize,
    pub cursor: usize,
    pub completed: bool,
}

/// Result of offering one key to the session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keystroke {
    pub accepted: bool,
    /// The host should swallow the key's default action (space scrolls in a browser)
    pub suppress_default: bool,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone)]
pub struct TypingSession {
    state: SessionState,
    current: Vec<char>,
    loaded: bool,
    last_accepted: Option<Instant>,
    lighting: LightingProfile,
    viewport: Viewport,
}

impl TypingSession {
    pub fn new(segments: Vec<String>, lighting: LightingProfile, viewport: Viewport) -> Self {
        Self {
            state: SessionState {
                segments,
                ..Default::default()
            },
            current: Vec::new(),
            loaded: false,
            last_accepted: None,
            lighting,
            viewport,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        match (self.loaded, self.state.completed) {
            (false, _) => Phase::Idle,
            (true, false) => Phase::AwaitingInput,
            (true, true) => Phase::Completed,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.state.segments
    }

    pub fn segment_index(&self) -> usize {
        self.state.segment_index
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    pub fn is_completed(&self) -> bool {
        self.state.completed
    }

    /// The loaded segment, or `""` before the first load
    pub fn current_segment(&self) -> &str {
        if self.loaded {
            self.state
                .segments
                .get(self.state.segment_index)
                .map(String::as_str)
                .unwrap_or_default()
        } else {
            ""
        }
    }

    pub fn current_chars(&self) -> &[char] {
        &self.current
    }

    pub fn expected_char(&self) -> Option<char> {
        self.current.get(self.state.cursor).copied()
    }

    pub fn has_next_segment(&self) -> bool {
        self.state.segment_index + 1 < self.state.segments.len()
    }

    pub fn progress(&self) -> f64 {
        if self.current.is_empty() {
            0.0
        } else {
            self.state.cursor as f64 / self.current.len() as f64
        }
    }

    pub fn lighting(&self) -> &LightingProfile {
        &self.lighting
    }

    /// Applies from the next lighting command on; keys already lit stay lit.
    pub fn set_lighting(&mut self, lighting: LightingProfile) {
        self.lighting = lighting;
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn light(&self, key: char) -> Effect {
        Effect::Light(LightCommand::light(self.lighting.mode, key, &self.lighting.color))
    }

    fn unlight(&self, key: char) -> Effect {
        Effect::Light(LightCommand::unlight(self.lighting.mode, key))
    }

    fn settle(&self, effects: &mut Vec<Effect>) {
        if !self.lighting.relight_delay.is_zero() {
            effects.push(Effect::Light(LightCommand::Settle(self.lighting.relight_delay)));
        }
    }

    /// Make `index` the current segment with a fresh cursor.
    ///
    /// Out of bounds indexes change nothing.
    pub fn load_segment(&mut self, index: usize, now: Instant) -> Vec<Effect> {
        let Some(segment) = self.state.segments.get(index) else {
            return Vec::new();
        };

        let previous_first = if self.loaded {
            self.current.first().copied()
        } else {
            None
        };
        let previous_lit = match self.phase() {
            Phase::AwaitingInput => self.expected_char().filter(|&c| Some(c) != previous_first),
            _ => None,
        };

        self.current = segment.chars().collect();
        self.state.segment_index = index;
        self.state.cursor = 0;
        self.state.completed = false;
        self.loaded = true;
        self.last_accepted = Some(now);

        let mut effects = vec![Effect::Progress(0.0)];
        if let Some(key) = previous_lit {
            effects.push(self.unlight(key));
        }
        if let Some(key) = previous_first {
            effects.push(self.unlight(key));
            self.settle(&mut effects);
        }
        if let Some(&first) = self.current.first() {
            effects.push(self.light(first));
        }
        effects
    }

    /// Offer one key, named the way a keyboard event names it.
    ///
    /// Anything that is not a single character is ignored, as is any key
    /// other than the expected one.
    pub fn handle_keystroke(&mut self, key: &str, now: Instant) -> Keystroke {
        let mut chars = key.chars();
        let typed = match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => return Keystroke::default(),
        };

        let mut outcome = Keystroke {
            suppress_default: typed == ' ',
            ..Default::default()
        };

        if self.phase() != Phase::AwaitingInput || self.expected_char() != Some(typed) {
            return outcome;
        }

        let since = self.last_accepted.unwrap_or(now);
        let interval_ms = now.saturating_duration_since(since).as_secs_f64() * 1000.0;
        self.last_accepted = Some(now);

        outcome.accepted = true;
        outcome.effects.push(Effect::RecordTiming(KeyTimingSample {
            letter: typed,
            interval_ms,
        }));
        outcome.effects.push(self.unlight(typed));

        self.state.cursor += 1;
        outcome.effects.push(Effect::Progress(self.progress()));

        match self.expected_char() {
            Some(next) => {
                self.settle(&mut outcome.effects);
                outcome.effects.push(self.light(next));
            }
            None => {
                self.state.completed = true;
                outcome
                    .effects
                    .push(Effect::Celebrate(self.celebration_targets()));
            }
        }

        outcome
    }

    /// Five burst targets around a point near the top-center of the viewport
    pub fn celebration_targets(&self) -> Vec<CelebrationTarget> {
        let base_x = self.viewport.width / 2.0;
        let base_y = self.viewport.height * CELEBRATION_ANCHOR_Y;
        CELEBRATION_OFFSETS
            .iter()
            .map(|(dx, dy)| CelebrationTarget {
                x: base_x + dx,
                y: base_y + dy,
            })
            .collect()
    }

    pub fn advance_segment(&mut self, now: Instant) -> Vec<Effect> {
        if self.has_next_segment() {
            self.load_segment(self.state.segment_index + 1, now)
        } else {
            vec![Effect::SessionComplete]
        }
    }

    pub fn retreat_segment(&mut self, now: Instant) -> Vec<Effect> {
        match self.state.segment_index.checked_sub(1) {
            Some(previous) if self.loaded => self.load_segment(previous, now),
            _ => Vec::new(),
        }
    }

    /// Drop all segments and progress.
    pub fn reset(&mut self) -> Vec<Effect> {
        self.state = SessionState::default();
        self.current.clear();
        self.loaded = false;
        self.last_accepted = None;
        vec![Effect::Light(LightCommand::AllOff), Effect::Progress(0.0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn no_delay() -> LightingProfile {
        LightingProfile {
            relight_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn session(segments: &[&str], lighting: LightingProfile) -> TypingSession {
        TypingSession::new(
            segments.iter().map(|s| s.to_string()).collect(),
            lighting,
            Viewport::new(100, 50),
        )
    }

    fn lights(effects: &[Effect]) -> Vec<LightCommand> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Light(cmd) => Some(cmd.clone()),
                _ => None,
            })
            .collect()
    }

    fn celebrations(effects: &[Effect]) -> Vec<Vec<CelebrationTarget>> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Celebrate(targets) => Some(targets.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn new_session_is_idle() {
        let mut s = session(&["cat"], no_delay());
        assert_eq!(s.phase(), Phase::Idle);
        assert_eq!(s.current_segment(), "");
        let k = s.handle_keystroke("c", Instant::now());
        assert!(!k.accepted);
        assert_eq!(s.cursor(), 0);
    }

    #[test]
    fn load_segment_lights_first_char() {
        let mut s = session(&["cat", "dog"], no_delay());
        let effects = s.load_segment(0, Instant::now());
        assert_eq!(effects[0], Effect::Progress(0.0));
        assert_eq!(
            lights(&effects),
            vec![LightCommand::KeyOn {
                key: 'c',
                color: LedColor::default(),
                duration_secs: None
            }]
        );
        assert_eq!(s.phase(), Phase::AwaitingInput);
        assert_eq!(s.current_segment(), "cat");
    }

    #[test]
    fn load_segment_turns_off_previous_first_char_then_settles() {
        let mut s = session(&["cat", "dog"], LightingProfile::default());
        let now = Instant::now();
        s.load_segment(0, now);
        let effects = s.load_segment(1, now);
        assert_eq!(
            lights(&effects),
            vec![
                LightCommand::KeyOff { key: 'c' },
                LightCommand::Settle(Duration::from_millis(30)),
                LightCommand::KeyOn {
                    key: 'd',
                    color: LedColor::default(),
                    duration_secs: None
                },
            ]
        );
    }

    #[test]
    fn load_segment_out_of_bounds_is_noop() {
        let mut s = session(&["cat"], no_delay());
        let now = Instant::now();
        s.load_segment(0, now);
        s.handle_keystroke("c", now);
        assert!(s.load_segment(1, now).is_empty());
        assert_eq!(s.cursor(), 1);
        assert_eq!(s.segment_index(), 0);
    }

    #[test]
    fn load_segment_always_resets_cursor_and_completion() {
        let mut s = session(&["ab", "cd"], no_delay());
        let now = Instant::now();
        s.load_segment(0, now);
        s.handle_keystroke("a", now);
        s.handle_keystroke("b", now);
        assert!(s.is_completed());

        s.load_segment(0, now);
        assert_eq!(s.cursor(), 0);
        assert!(!s.is_completed());

        s.handle_keystroke("a", now);
        s.load_segment(1, now);
        assert_eq!(s.cursor(), 0);
        assert!(!s.is_completed());
    }

    #[test]
    fn typing_cat_completes_with_one_celebration() {
        let mut s = session(&["cat"], no_delay());
        let now = Instant::now();
        s.load_segment(0, now);

        let mut all = Vec::new();
        for (i, key) in ["c", "a", "t"].iter().enumerate() {
            let k = s.handle_keystroke(key, now);
            assert!(k.accepted);
            assert_eq!(s.cursor(), i + 1);
            all.push(k.effects);
        }
        assert!(s.is_completed());
        assert_eq!(s.phase(), Phase::Completed);

        let last = all.last().unwrap();
        assert_eq!(lights(last), vec![LightCommand::KeyOff { key: 't' }]);
        assert!(last.contains(&Effect::Progress(1.0)));

        let flat: Vec<Effect> = all.into_iter().flatten().collect();
        let bursts = celebrations(&flat);
        assert_eq!(bursts.len(), 1);
        assert_eq!(bursts[0].len(), 5);
    }

    #[test]
    fn wrong_key_changes_nothing() {
        let mut s = session(&["cat"], no_delay());
        let now = Instant::now();
        s.load_segment(0, now);
        let before = s.state().clone();

        let k = s.handle_keystroke("x", now);
        assert!(!k.accepted);
        assert!(k.effects.is_empty());
        assert_eq!(s.state(), &before);

        let k = s.handle_keystroke("c", now);
        assert!(k.accepted);
        assert_eq!(s.cursor(), 1);
    }

    #[test]
    fn matching_is_case_sensitive() {
        let mut s = session(&["Cat"], no_delay());
        s.load_segment(0, Instant::now());
        assert!(!s.handle_keystroke("c", Instant::now()).accepted);
        assert!(s.handle_keystroke("C", Instant::now()).accepted);
    }

    #[test]
    fn named_keys_are_ignored() {
        let mut s = session(&["a b"], no_delay());
        s.load_segment(0, Instant::now());
        for key in ["Shift", "Enter", "", "ab"] {
            let k = s.handle_keystroke(key, Instant::now());
            assert_eq!(k, Keystroke::default());
        }
        assert_eq!(s.cursor(), 0);
    }

    #[test]
    fn space_suppresses_default_even_when_wrong() {
        let mut s = session(&["a b"], no_delay());
        let now = Instant::now();
        s.load_segment(0, now);
        let k = s.handle_keystroke(" ", now);
        assert!(k.suppress_default);
        assert!(!k.accepted);

        s.handle_keystroke("a", now);
        let k = s.handle_keystroke(" ", now);
        assert!(k.suppress_default && k.accepted);
        assert_eq!(lights(&k.effects)[0], LightCommand::KeyOff { key: ' ' });
    }

    #[test]
    fn keystrokes_after_completion_are_ignored() {
        let mut s = session(&["a"], no_delay());
        let now = Instant::now();
        s.load_segment(0, now);
        s.handle_keystroke("a", now);
        let k = s.handle_keystroke("a", now);
        assert!(!k.accepted);
        assert_eq!(s.cursor(), 1);
    }

    #[test]
    fn relight_between_characters_settles() {
        let mut s = session(&["ab"], LightingProfile::default());
        let now = Instant::now();
        s.load_segment(0, now);
        let k = s.handle_keystroke("a", now);
        assert_eq!(
            lights(&k.effects),
            vec![
                LightCommand::KeyOff { key: 'a' },
                LightCommand::Settle(Duration::from_millis(30)),
                LightCommand::KeyOn {
                    key: 'b',
                    color: LedColor::default(),
                    duration_secs: None
                },
            ]
        );
    }

    #[test]
    fn region_mode_uses_region_commands() {
        let mut s = session(
            &["qf"],
            LightingProfile {
                mode: LightingMode::Region,
                ..no_delay()
            },
        );
        let now = Instant::now();
        let effects = s.load_segment(0, now);
        assert_matches!(lights(&effects)[0], LightCommand::RegionOn { key: 'q', .. });
        let k = s.handle_keystroke("q", now);
        assert_eq!(lights(&k.effects)[0], LightCommand::RegionOff { key: 'q' });
        assert_matches!(lights(&k.effects)[1], LightCommand::RegionOn { key: 'f', .. });
    }

    #[test]
    fn timing_is_measured_from_load_then_previous_key() {
        let mut s = session(&["ab"], no_delay());
        let t0 = Instant::now();
        s.load_segment(0, t0);

        let k = s.handle_keystroke("a", t0 + Duration::from_millis(250));
        assert_matches!(
            k.effects[0],
            Effect::RecordTiming(KeyTimingSample { letter: 'a', interval_ms }) if (interval_ms - 250.0).abs() < 1e-6
        );

        // a rejected key does not restart the clock
        s.handle_keystroke("z", t0 + Duration::from_millis(300));
        let k = s.handle_keystroke("b", t0 + Duration::from_millis(400));
        assert_matches!(
            k.effects[0],
            Effect::RecordTiming(KeyTimingSample { letter: 'b', interval_ms }) if (interval_ms - 150.0).abs() < 1e-6
        );
    }

    #[test]
    fn progress_tracks_cursor() {
        let mut s = session(&["abcd"], no_delay());
        let now = Instant::now();
        s.load_segment(0, now);
        let k = s.handle_keystroke("a", now);
        assert!(k.effects.contains(&Effect::Progress(0.25)));
        assert_eq!(s.progress(), 0.25);
    }

    #[test]
    fn celebration_targets_surround_top_center() {
        let s = session(&["x"], no_delay());
        let targets = s.celebration_targets();
        assert_eq!(targets.len(), 5);
        assert_eq!(targets[0], CelebrationTarget { x: 50.0, y: 5.0 });
        assert_eq!(targets[1], CelebrationTarget { x: 30.0, y: 7.0 });
        assert_eq!(targets[4], CelebrationTarget { x: 65.0, y: 3.0 });
    }

    #[test]
    fn advance_and_retreat() {
        let mut s = session(&["a", "b"], no_delay());
        let now = Instant::now();
        s.load_segment(0, now);
        assert!(s.retreat_segment(now).is_empty());

        s.advance_segment(now);
        assert_eq!(s.segment_index(), 1);
        assert_eq!(s.current_segment(), "b");

        assert_eq!(s.advance_segment(now), vec![Effect::SessionComplete]);
        assert_eq!(s.segment_index(), 1);

        s.retreat_segment(now);
        assert_eq!(s.segment_index(), 0);
    }

    #[test]
    fn retreat_mid_segment_turns_off_the_lit_key() {
        let mut s = session(&["xy", "abc"], no_delay());
        let now = Instant::now();
        s.load_segment(1, now);
        s.handle_keystroke("a", now);
        assert_eq!(s.expected_char(), Some('b'));

        let effects = s.retreat_segment(now);
        assert_eq!(
            lights(&effects),
            vec![
                LightCommand::KeyOff { key: 'b' },
                LightCommand::KeyOff { key: 'a' },
                LightCommand::KeyOn {
                    key: 'x',
                    color: LedColor::default(),
                    duration_secs: None
                },
            ]
        );
    }

    #[test]
    fn reloading_at_the_first_char_turns_it_off_once() {
        let mut s = session(&["ab", "cd"], no_delay());
        let now = Instant::now();
        s.load_segment(1, now);
        let effects = s.retreat_segment(now);
        assert_eq!(
            lights(&effects)
                .iter()
                .filter(|c| matches!(c, LightCommand::KeyOff { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = session(&["a", "b"], no_delay());
        let now = Instant::now();
        s.load_segment(1, now);
        let effects = s.reset();
        assert_eq!(lights(&effects), vec![LightCommand::AllOff]);
        assert!(s.segments().is_empty());
        assert_eq!(s.state(), &SessionState::default());
        assert_eq!(s.phase(), Phase::Idle);
        assert!(s.advance_segment(now) == vec![Effect::SessionComplete]);
    }
}

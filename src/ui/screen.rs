use ratatui::Frame;

use crate::{
    ui::{input_view::render_input, render_success, stats_view::render_stats},
    App, AppState,
};

/// One full-terminal screen of the app
pub trait Screen {
    fn render(&self, app: &mut App, f: &mut Frame);
}

pub struct InputScreen;

impl Screen for InputScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        render_input(app, f);
    }
}

/// Practice screen, rendered by the `App` widget
pub struct DisplayScreen;

impl Screen for DisplayScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        f.render_widget(&*app, f.area());
    }
}

pub struct SuccessScreen;

impl Screen for SuccessScreen {
    fn render(&self, _app: &mut App, f: &mut Frame) {
        render_success(f);
    }
}

pub struct StatsScreen;

impl Screen for StatsScreen {
    fn render(&self, app: &mut App, f: &mut Frame) {
        render_stats(app, f);
    }
}

pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Input => Box::new(InputScreen),
        AppState::Display => Box::new(DisplayScreen),
        AppState::Success => Box::new(SuccessScreen),
        AppState::Stats => Box::new(StatsScreen),
    }
}

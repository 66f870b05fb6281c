use crate::lighting::{LedColor, LightingMode};
use crate::store::KeyValueStore;

pub const FONT_SIZE_KEY: &str = "font_size";
pub const LIGHTING_MODE_KEY: &str = "lighting_mode";
pub const LED_COLOR_KEY: &str = "led_color";

/// Letter size on the display screen, stored as its point size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FontSize {
    pub const ALL: [FontSize; 3] = [FontSize::Small, FontSize::Medium, FontSize::Large];

    pub fn points(self) -> u16 {
        match self {
            FontSize::Small => 80,
            FontSize::Medium => 120,
            FontSize::Large => 160,
        }
    }

    pub fn from_points(points: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.points() == points)
    }

    /// Blank cells on each side of a rendered letter
    pub fn cell_padding(self) -> u16 {
        match self {
            FontSize::Small => 0,
            FontSize::Medium => 1,
            FontSize::Large => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    pub font_size: FontSize,
    pub lighting_mode: LightingMode,
    pub led_color: LedColor,
}

impl Settings {
    /// Read settings, keeping the default for anything absent or unreadable.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Settings::default();
        Self {
            font_size: store
                .get(FONT_SIZE_KEY)
                .and_then(|raw| raw.trim().parse::<u16>().ok())
                .and_then(FontSize::from_points)
                .unwrap_or(defaults.font_size),
            lighting_mode: store
                .get(LIGHTING_MODE_KEY)
                .and_then(|raw| LightingMode::parse(&raw))
                .unwrap_or(defaults.lighting_mode),
            led_color: store
                .get(LED_COLOR_KEY)
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(defaults.led_color),
        }
    }

    pub fn save(&self, store: &dyn KeyValueStore) {
        store.set(FONT_SIZE_KEY, &self.font_size.points().to_string());
        store.set(LIGHTING_MODE_KEY, &self.lighting_mode.to_string());
        store.set(LED_COLOR_KEY, self.led_color.as_str());
    }
}

//! Decorative firework bursts drawn over the display screen.
//!
//! Positions are in terminal cells, time in seconds. Randomness is drawn
//! once when a firework is launched, so [`Firework::advanced`] is a pure
//! function of the state and the time step.

use rand::seq::SliceRandom;
use rand::Rng;
use std::f64::consts::TAU;

use crate::session::CelebrationTarget;

pub const PARTICLES_PER_BURST: usize = 72;
/// A burst is dropped after this long even if particles remain
pub const MAX_BURST_SECS: f64 = 4.0;

const GRAVITY: f64 = 6.0;
/// Velocity kept per 1/60 s
const FRICTION: f64 = 0.98;
const FADE_PER_SEC: f64 = 0.45;
/// Terminal cells are roughly twice as tall as wide
const CELL_ASPECT: f64 = 0.5;
/// Seconds a rocket takes to reach its target, whatever the viewport height
const LAUNCH_SECS: std::ops::Range<f64> = 0.8..1.4;

const PALETTES: &[&[u16]] = &[
    &[0, 60, 120, 180, 240, 300],
    &[10, 25, 40, 55, 70, 85],
    &[180, 200, 220, 260, 280, 320],
    &[0, 30, 60, 90, 120, 150, 180, 210, 240, 270, 300, 330],
];

/// Request to launch one firework towards a target point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CelebrationRequest {
    pub id: u64,
    pub target_x: f64,
    pub target_y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vel_x: f64,
    pub vel_y: f64,
    pub hue: u16,
    pub lightness: f64,
    pub alpha: f64,
}

impl Particle {
    fn advanced(&self, dt: f64, wind: (f64, f64)) -> Particle {
        let drag = FRICTION.powf(dt * 60.0);
        let vel_x = self.vel_x * drag + wind.0 * dt;
        let vel_y = self.vel_y * drag + (GRAVITY + wind.1) * dt;
        Particle {
            x: self.x + vel_x * dt,
            y: self.y + vel_y * dt,
            vel_x,
            vel_y,
            alpha: self.alpha - FADE_PER_SEC * dt,
            ..self.clone()
        }
    }

    pub fn is_visible(&self) -> bool {
        self.alpha > 0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Spark {
    speed: f64,
    hue: u16,
    lightness: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BurstPhase {
    Launch { rocket_y: f64 },
    Exploded { particles: Vec<Particle> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Firework {
    pub id: u64,
    pub x: f64,
    pub target_y: f64,
    pub hue: u16,
    pub phase: BurstPhase,
    pub age: f64,
    speed: f64,
    wind: (f64, f64),
    sparks: Vec<Spark>,
}

impl Firework {
    /// Launch from the bottom of a viewport `viewport_height` cells tall.
    pub fn launch<R: Rng>(
        request: CelebrationRequest,
        viewport_height: f64,
        rng: &mut R,
    ) -> Self {
        let palette = PALETTES.choose(rng).copied().unwrap_or(PALETTES[0]);
        let pick_hue = |rng: &mut R| palette.choose(rng).copied().unwrap_or(0);

        let sparks = (0..PARTICLES_PER_BURST)
            .map(|_| Spark {
                speed: rng.gen_range(6.0..18.0),
                hue: pick_hue(rng),
                lightness: rng.gen_range(45.0..75.0),
            })
            .collect();

        let climb = (viewport_height - request.target_y).max(1.0);

        Self {
            id: request.id,
            x: request.target_x,
            target_y: request.target_y,
            hue: pick_hue(rng),
            phase: BurstPhase::Launch {
                rocket_y: viewport_height,
            },
            age: 0.0,
            speed: climb / rng.gen_range(LAUNCH_SECS),
            wind: (rng.gen_range(-0.5..0.5), -0.3),
            sparks,
        }
    }

    /// State after `dt` seconds, or `None` once the burst has burnt out.
    pub fn advanced(&self, dt: f64) -> Option<Firework> {
        let age = self.age + dt;
        if age >= MAX_BURST_SECS {
            return None;
        }

        let phase = match &self.phase {
            BurstPhase::Launch { rocket_y } => {
                let rocket_y = rocket_y - self.speed * dt;
                if rocket_y <= self.target_y {
                    BurstPhase::Exploded {
                        particles: self.explode(rocket_y),
                    }
                } else {
                    BurstPhase::Launch { rocket_y }
                }
            }
            BurstPhase::Exploded { particles } => {
                let particles: Vec<Particle> = particles
                    .iter()
                    .map(|p| p.advanced(dt, self.wind))
                    .filter(Particle::is_visible)
                    .collect();
                if particles.is_empty() {
                    return None;
                }
                BurstPhase::Exploded { particles }
            }
        };

        Some(Firework {
            phase,
            age,
            ..self.clone()
        })
    }

    fn explode(&self, y: f64) -> Vec<Particle> {
        let count = self.sparks.len().max(1) as f64;
        self.sparks
            .iter()
            .enumerate()
            .map(|(i, spark)| {
                let angle = i as f64 / count * TAU;
                Particle {
                    x: self.x,
                    y,
                    vel_x: angle.cos() * spark.speed,
                    vel_y: angle.sin() * spark.speed * CELL_ASPECT,
                    hue: spark.hue,
                    lightness: spark.lightness,
                    alpha: 1.0,
                }
            })
            .collect()
    }

    pub fn particles(&self) -> &[Particle] {
        match &self.phase {
            BurstPhase::Exploded { particles } => particles,
            BurstPhase::Launch { .. } => &[],
        }
    }
}

/// All bursts currently in flight
#[derive(Debug, Clone, Default)]
pub struct FireworkOverlay {
    bursts: Vec<Firework>,
    next_id: u64,
    viewport_height: f64,
}

impl FireworkOverlay {
    pub fn new(viewport_height: f64) -> Self {
        Self {
            viewport_height,
            ..Default::default()
        }
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        self.viewport_height = height;
    }

    /// Launch one firework per target.
    pub fn celebrate(&mut self, targets: &[CelebrationTarget]) {
        let requests: Vec<CelebrationRequest> = targets
            .iter()
            .map(|t| {
                self.next_id += 1;
                CelebrationRequest {
                    id: self.next_id,
                    target_x: t.x,
                    target_y: t.y,
                }
            })
            .collect();
        self.spawn(&requests);
    }

    pub fn spawn(&mut self, requests: &[CelebrationRequest]) {
        let mut rng = rand::thread_rng();
        for request in requests {
            self.bursts
                .push(Firework::launch(*request, self.viewport_height, &mut rng));
        }
    }

    pub fn advance(&mut self, dt: f64) {
        self.bursts = self
            .bursts
            .iter()
            .filter_map(|burst| burst.advanced(dt))
            .collect();
    }

    pub fn is_active(&self) -> bool {
        !self.bursts.is_empty()
    }

    pub fn bursts(&self) -> &[Firework] {
        &self.bursts
    }

    pub fn clear(&mut self) {
        self.bursts.clear();
    }
}

/// `h` in degrees, `s` and `l` in percent.
pub fn hsl_to_rgb(h: u16, s: f64, l: f64) -> (u8, u8, u8) {
    let h = (h % 360) as f64;
    let s = (s / 100.0).clamp(0.0, 1.0);
    let l = (l / 100.0).clamp(0.0, 1.0);

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match h {
        h if h < 60.0 => (c, x, 0.0),
        h if h < 120.0 => (x, c, 0.0),
        h if h < 180.0 => (0.0, c, x),
        h if h < 240.0 => (0.0, x, c),
        h if h < 300.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let to_byte = |v: f64| ((v + m) * 255.0).round() as u8;
    (to_byte(r), to_byte(g), to_byte(b))
}

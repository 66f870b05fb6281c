//! Commands for the local keyboard-lighting service and the clients that
//! deliver them.
//!
//! The typing flow never waits on the lights: [`HttpLightingClient`] queues
//! every command onto a single worker thread which posts them in order and
//! logs failures without retrying.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default address of the lighting service.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5050";

/// Default color for lit keys.
pub const DEFAULT_LED_COLOR: &str = "#00FF00";

/// Colors offered by the settings screen, in cycling order.
pub const COLOR_PRESETS: &[&str] = &[
    "#00FF00", "#FF0000", "#0000FF", "#00FFFF", "#FF00FF", "#FFFF00", "#FFFFFF",
];

#[derive(Debug, Error)]
pub enum LightingError {
    #[error("lighting request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("lighting backend answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not start lighting worker: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color {0:?}, expected #RRGGBB")]
pub struct ColorParseError(pub String);

/// Which endpoint family lights the next character
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LightingMode {
    #[default]
    Individual,
    Region,
}

impl LightingMode {
    pub fn toggled(self) -> Self {
        match self {
            LightingMode::Individual => LightingMode::Region,
            LightingMode::Region => LightingMode::Individual,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(s.trim(), true).ok()
    }
}

/// An LED color in `#RRGGBB` form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LedColor(String);

impl LedColor {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&self.0[range], 16).unwrap_or_default()
        };
        (channel(1..3), channel(3..5), channel(5..7))
    }

    /// The preset after this one, wrapping around; unknown colors restart the cycle.
    pub fn next_preset(&self) -> LedColor {
        let idx = COLOR_PRESETS
            .iter()
            .position(|p| p.eq_ignore_ascii_case(&self.0))
            .map(|i| (i + 1) % COLOR_PRESETS.len())
            .unwrap_or(0);
        LedColor(COLOR_PRESETS[idx].to_string())
    }
}

impl Default for LedColor {
    fn default() -> Self {
        LedColor(DEFAULT_LED_COLOR.to_string())
    }
}

impl FromStr for LedColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = s.len() == 7
            && s.starts_with('#')
            && s[1..].chars().all(|c| c.is_ascii_hexdigit());
        if valid {
            Ok(LedColor(s.to_ascii_uppercase()))
        } else {
            Err(ColorParseError(s.to_string()))
        }
    }
}

impl TryFrom<String> for LedColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LedColor> for String {
    fn from(color: LedColor) -> Self {
        color.0
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name the lighting service uses for a typed character.
pub fn backend_key_name(c: char) -> String {
    if c == ' ' {
        "SPACE".to_string()
    } else {
        c.to_uppercase().collect()
    }
}

/// One instruction for the lighting service.
///
/// `Settle` is not sent anywhere; the worker pauses before the next command.
#[derive(Debug, Clone, PartialEq)]
pub enum LightCommand {
    AllOff,
    KeyOn {
        key: char,
        color: LedColor,
        duration_secs: Option<u32>,
    },
    KeyOff {
        key: char,
    },
    RegionOn {
        key: char,
        color: LedColor,
        duration_secs: Option<u32>,
    },
    RegionOff {
        key: char,
    },
    BindRegionsColor {
        color: LedColor,
    },
    Settle(Duration),
}

#[derive(Debug, Serialize)]
struct LightPayload<'a> {
    key: String,
    color: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<u32>,
}

#[derive(Debug, Serialize)]
struct KeyPayload {
    key: String,
}

#[derive(Debug, Serialize)]
struct ColorPayload<'a> {
    color: &'a str,
}

impl LightCommand {
    /// Light `key` until it is explicitly turned off.
    pub fn light(mode: LightingMode, key: char, color: &LedColor) -> Self {
        match mode {
            LightingMode::Individual => LightCommand::KeyOn {
                key,
                color: color.clone(),
                duration_secs: None,
            },
            LightingMode::Region => LightCommand::RegionOn {
                key,
                color: color.clone(),
                duration_secs: None,
            },
        }
    }

    pub fn unlight(mode: LightingMode, key: char) -> Self {
        match mode {
            LightingMode::Individual => LightCommand::KeyOff { key },
            LightingMode::Region => LightCommand::RegionOff { key },
        }
    }

    /// Endpoint path, or `None` for commands handled locally.
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            LightCommand::AllOff => Some("lights_off"),
            LightCommand::KeyOn { .. } => Some("lights_on_key"),
            LightCommand::KeyOff { .. } => Some("lights_off_key"),
            LightCommand::RegionOn { .. } => Some("lights_on_region_for_key"),
            LightCommand::RegionOff { .. } => Some("lights_off_region_for_key"),
            LightCommand::BindRegionsColor { .. } => Some("bind_regions_color"),
            LightCommand::Settle(_) => None,
        }
    }

    /// JSON body, if the endpoint takes one.
    pub fn payload(&self) -> Option<serde_json::Value> {
        let value = match self {
            LightCommand::AllOff | LightCommand::Settle(_) => return None,
            LightCommand::KeyOn {
                key,
                color,
                duration_secs,
            }
            | LightCommand::RegionOn {
                key,
                color,
                duration_secs,
            } => serde_json::to_value(LightPayload {
                key: backend_key_name(*key),
                color: color.as_str(),
                duration: *duration_secs,
            }),
            LightCommand::KeyOff { key } | LightCommand::RegionOff { key } => {
                serde_json::to_value(KeyPayload {
                    key: backend_key_name(*key),
                })
            }
            LightCommand::BindRegionsColor { color } => serde_json::to_value(ColorPayload {
                color: color.as_str(),
            }),
        };
        value.ok()
    }
}

/// Output of the backend's `run_test` diagnostic.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DiagnosticReport {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub returncode: Option<i32>,
}

/// Blocking connection to the lighting service.
///
/// Must not be used from inside an async runtime.
#[derive(Debug, Clone)]
pub struct LightingBackend {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl LightingBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LightingError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform one command and wait for the answer.
    pub fn execute(&self, command: &LightCommand) -> Result<(), LightingError> {
        let endpoint = match command {
            LightCommand::Settle(pause) => {
                thread::sleep(*pause);
                return Ok(());
            }
            other => match other.endpoint() {
                Some(endpoint) => endpoint,
                None => return Ok(()),
            },
        };

        let mut request = self.http.post(format!("{}/{}", self.base_url, endpoint));
        if let Some(body) = command.payload() {
            request = request.json(&body);
        }
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LightingError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    pub fn run_test(&self) -> Result<DiagnosticReport, LightingError> {
        let response = self
            .http
            .post(format!("{}/run_test", self.base_url))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LightingError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<DiagnosticReport>()?)
    }
}

/// Fire-and-forget sink for lighting commands
pub trait LightingClient {
    fn send(&self, command: LightCommand);
}

impl<T: LightingClient + ?Sized> LightingClient for Box<T> {
    fn send(&self, command: LightCommand) {
        (**self).send(command)
    }
}

/// Used when lighting is disabled
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLightingClient;

impl LightingClient for NullLightingClient {
    fn send(&self, command: LightCommand) {
        log::trace!("lighting disabled, dropping {:?}", command);
    }
}

/// Keeps every command for inspection in tests and headless runs.
#[derive(Debug, Default, Clone)]
pub struct RecordingLightingClient {
    sent: Arc<Mutex<Vec<LightCommand>>>,
}

impl RecordingLightingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<LightCommand> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.clear();
        }
    }
}

impl LightingClient for RecordingLightingClient {
    fn send(&self, command: LightCommand) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(command);
        }
    }
}

enum Job {
    Run(LightCommand),
    /// Answered once every earlier command has been performed
    Flush(Sender<()>),
}

/// Queues commands to a background thread that posts them in order.
pub struct HttpLightingClient {
    tx: Option<Sender<Job>>,
    closing: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl HttpLightingClient {
    pub fn spawn(base_url: &str, timeout: Duration) -> Result<Self, LightingError> {
        let (tx, rx) = mpsc::channel::<Job>();
        let closing = Arc::new(AtomicBool::new(false));
        let base_url = base_url.to_string();

        let worker = {
            let closing = Arc::clone(&closing);
            thread::Builder::new()
                .name("keyglow-lights".into())
                .spawn(move || {
                    // built here so the blocking client lives and dies on this thread
                    let backend = match LightingBackend::new(&base_url, timeout) {
                        Ok(backend) => backend,
                        Err(e) => {
                            log::error!("lighting disabled, client setup failed: {}", e);
                            for job in rx {
                                if let Job::Flush(ack) = job {
                                    let _ = ack.send(());
                                }
                            }
                            return;
                        }
                    };
                    log::info!("lighting worker started for {}", backend.base_url());
                    run_worker(&backend, &rx, &closing);
                    log::info!("lighting worker stopped");
                })?
        };

        Ok(Self {
            tx: Some(tx),
            closing,
            worker: Some(worker),
        })
    }

    /// Block until every command sent so far has been performed.
    pub fn flush(&self) {
        let Some(tx) = &self.tx else {
            return;
        };
        let (ack_tx, ack_rx) = mpsc::channel();
        if tx.send(Job::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    /// Stop the worker.
    ///
    /// Key commands still queued are dropped; a queued `AllOff` is still
    /// sent, once.
    pub fn shutdown(&mut self) {
        self.closing.store(true, Ordering::SeqCst);
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("lighting worker panicked");
            }
        }
    }
}

fn run_worker(backend: &LightingBackend, rx: &Receiver<Job>, closing: &AtomicBool) {
    let perform = |command: &LightCommand| {
        log::debug!("lighting: {:?}", command);
        if let Err(e) = backend.execute(command) {
            log::warn!("lighting command {:?} failed: {}", command, e);
        }
    };

    for job in rx.iter() {
        let command = match job {
            Job::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
            Job::Run(command) => command,
        };

        if !closing.load(Ordering::SeqCst) {
            perform(&command);
            continue;
        }

        let pending: Vec<LightCommand> = std::iter::once(Job::Run(command))
            .chain(rx.try_iter())
            .filter_map(|job| match job {
                Job::Run(command) => Some(command),
                Job::Flush(ack) => {
                    let _ = ack.send(());
                    None
                }
            })
            .collect();
        let all_off = pending.contains(&LightCommand::AllOff);
        log::debug!(
            "lighting worker closing, dropping {} queued commands",
            pending.len() - usize::from(all_off)
        );
        if all_off {
            perform(&LightCommand::AllOff);
        }
        break;
    }
}

impl LightingClient for HttpLightingClient {
    fn send(&self, command: LightCommand) {
        if let Some(tx) = &self.tx {
            if tx.send(Job::Run(command)).is_err() {
                log::warn!("lighting worker is gone, command dropped");
            }
        }
    }
}

impl Drop for HttpLightingClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

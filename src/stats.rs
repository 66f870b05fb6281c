use std::collections::{BTreeMap, VecDeque};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Local};
use itertools::Itertools;

use crate::lighting::backend_key_name;
use crate::store::{get_json, set_json, KeyValueStore};

/// Samples kept per letter, and raw intervals kept overall
pub const SAMPLE_LIMIT: usize = 500;
/// Samples shown in the stats table and CSV export
pub const RECENT_SAMPLES: usize = 10;
pub const DEFAULT_CSV_NAME: &str = "typing_stats.csv";

pub const PER_LETTER_KEY: &str = "per_letter_stats";
pub const INTERVALS_KEY: &str = "intervals";
pub const UPDATED_AT_KEY: &str = "stats_updated_at";

/// Time between an accepted keystroke and the one before it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyTimingSample {
    pub letter: char,
    pub interval_ms: f64,
}

/// One row of the stats table
#[derive(Debug, Clone, PartialEq)]
pub struct LetterSummary {
    pub letter: String,
    pub count: usize,
    pub avg_ms: Option<f64>,
    pub recent: Vec<f64>,
}

/// Accumulated keystroke timings, independent of any practice session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingStats {
    per_letter: BTreeMap<String, VecDeque<f64>>,
    intervals: VecDeque<f64>,
    updated_at: Option<DateTime<Local>>,
}

fn mean(data: &[f64]) -> Option<f64> {
    match data.len() {
        0 => None,
        count => Some(data.iter().sum::<f64>() / count as f64),
    }
}

fn push_bounded(buf: &mut VecDeque<f64>, value: f64) {
    buf.push_back(value);
    while buf.len() > SAMPLE_LIMIT {
        buf.pop_front();
    }
}

/// One lowercase char per row, even where lowercasing expands
fn letter_key(letter: char) -> String {
    letter.to_lowercase().next().unwrap_or(letter).to_string()
}

impl TimingStats {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let per_letter: BTreeMap<String, Vec<f64>> =
            get_json(store, PER_LETTER_KEY).unwrap_or_default();
        let intervals: Vec<f64> = get_json(store, INTERVALS_KEY).unwrap_or_default();
        let updated_at = store
            .get(UPDATED_AT_KEY)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|dt| dt.with_timezone(&Local));

        let mut stats = TimingStats {
            updated_at,
            ..Default::default()
        };
        for (key, samples) in per_letter {
            let Some(letter) = key.chars().next() else {
                continue;
            };
            let buf = stats.per_letter.entry(letter_key(letter)).or_default();
            for sample in samples.into_iter().filter(|s| s.is_finite() && *s >= 0.0) {
                push_bounded(buf, sample);
            }
        }
        for interval in intervals.into_iter().filter(|s| s.is_finite() && *s >= 0.0) {
            push_bounded(&mut stats.intervals, interval);
        }
        stats
    }

    pub fn save(&self, store: &dyn KeyValueStore) {
        set_json(store, PER_LETTER_KEY, &self.per_letter);
        set_json(store, INTERVALS_KEY, &self.intervals);
        match self.updated_at {
            Some(at) => store.set(UPDATED_AT_KEY, &at.to_rfc3339()),
            None => store.remove(UPDATED_AT_KEY),
        }
    }

    pub fn clear(&mut self, store: &dyn KeyValueStore) {
        *self = TimingStats::default();
        store.remove(PER_LETTER_KEY);
        store.remove(INTERVALS_KEY);
        store.remove(UPDATED_AT_KEY);
    }

    pub fn record(&mut self, sample: KeyTimingSample) {
        let interval = sample.interval_ms.max(0.0);
        push_bounded(
            self.per_letter.entry(letter_key(sample.letter)).or_default(),
            interval,
        );
        push_bounded(&mut self.intervals, interval);
        self.updated_at = Some(Local::now());
    }

    pub fn is_empty(&self) -> bool {
        self.per_letter.is_empty()
    }

    pub fn samples_for(&self, letter: char) -> Vec<f64> {
        self.per_letter
            .get(&letter_key(letter))
            .map(|buf| buf.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn intervals(&self) -> Vec<f64> {
        self.intervals.iter().copied().collect()
    }

    pub fn updated_at(&self) -> Option<DateTime<Local>> {
        self.updated_at
    }

    pub fn overall_avg_ms(&self) -> Option<f64> {
        mean(&self.intervals()).map(f64::round)
    }

    /// Rows sorted by displayed letter
    pub fn summary(&self) -> Vec<LetterSummary> {
        self.per_letter
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(key, samples)| {
                let letter = key
                    .chars()
                    .next()
                    .map(backend_key_name)
                    .unwrap_or_default();
                let all: Vec<f64> = samples.iter().copied().collect();
                let recent = all
                    .iter()
                    .skip(all.len().saturating_sub(RECENT_SAMPLES))
                    .map(|v| v.round())
                    .collect();
                LetterSummary {
                    letter,
                    count: all.len(),
                    avg_ms: mean(&all).map(f64::round),
                    recent,
                }
            })
            .sorted_by(|a, b| a.letter.cmp(&b.letter))
            .collect()
    }

    /// Write the summary as CSV with every field quoted.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut csv = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .from_writer(writer);
        csv.write_record(["Letter", "Count", "Avg(ms)", "Samples (last 10)"])?;
        for row in self.summary() {
            csv.write_record([
                row.letter.clone(),
                row.count.to_string(),
                row.avg_ms.map(|a| a.to_string()).unwrap_or_default(),
                row.recent.iter().map(|v| v.to_string()).join(";"),
            ])?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn export_csv<P: AsRef<Path>>(&self, path: P) -> Result<(), csv::Error> {
        let file = File::create(path.as_ref())?;
        self.write_csv(file)?;
        log::info!("exported typing stats to {}", path.as_ref().display());
        Ok(())
    }
}

use itertools::Itertools;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Wrap},
    Frame,
};

use keyglow::stats::{LetterSummary, RECENT_SAMPLES};

use crate::App;

/// Pure presenter for one letter's row
pub fn present_row(row: &LetterSummary) -> Row<'static> {
    let avg_cell = match row.avg_ms {
        Some(avg) => {
            let color = if avg < 150.0 {
                Color::Green
            } else if avg < 250.0 {
                Color::Yellow
            } else {
                Color::Red
            };
            Cell::from(format!("{avg:.0}")).style(Style::default().fg(color))
        }
        None => Cell::from("-"),
    };

    Row::new(vec![
        Cell::from(row.letter.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
        Cell::from(row.count.to_string()),
        avg_cell,
        Cell::from(row.recent.iter().map(|v| format!("{v:.0}")).join(", "))
            .style(Style::default().fg(Color::Gray)),
    ])
}

pub fn render_stats(app: &mut App, f: &mut Frame) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(0),    // table
            Constraint::Length(1), // status
            Constraint::Length(2), // instructions
        ])
        .split(area);

    let stats = app.practice.stats();
    let mut title = String::from("Per-letter timing");
    if let Some(avg) = stats.overall_avg_ms() {
        title.push_str(&format!("  (overall avg {avg:.0} ms)"));
    }
    if let Some(at) = stats.updated_at() {
        title.push_str(&format!("  updated {}", at.format("%Y-%m-%d %H:%M")));
    }
    f.render_widget(
        Paragraph::new(title)
            .block(Block::default().borders(Borders::ALL).title("Stats"))
            .style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center),
        chunks[0],
    );

    let summary = stats.summary();
    if summary.is_empty() {
        f.render_widget(
            Paragraph::new("No timing stats yet. Practice some text to collect data.")
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Gray)),
            chunks[1],
        );
    } else {
        let table_height = chunks[1].height.saturating_sub(3) as usize; // borders + header
        let max_scroll = summary.len().saturating_sub(table_height);
        app.stats_scroll = app.stats_scroll.min(max_scroll);

        let header = Row::new(vec![
            Cell::from("Letter"),
            Cell::from("Count"),
            Cell::from("Avg (ms)"),
            Cell::from(format!("Samples (last {RECENT_SAMPLES})")),
        ])
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let rows: Vec<Row> = summary
            .iter()
            .skip(app.stats_scroll)
            .take(table_height)
            .map(present_row)
            .collect();

        let widths = [
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(9),
            Constraint::Min(20),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Letters ({}/{})",
                (app.stats_scroll + table_height).min(summary.len()),
                summary.len()
            )))
            .column_spacing(2);
        f.render_widget(table, chunks[1]);
    }

    if let Some(status) = &app.status {
        f.render_widget(
            Paragraph::new(status.as_str())
                .alignment(Alignment::Center)
                .style(Style::default().fg(Color::Green)),
            chunks[2],
        );
    }

    f.render_widget(
        Paragraph::new("(↑/↓) scroll  (PgUp/PgDn) page  (e) export csv  (r) reset stats  (esc) back")
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        chunks[3],
    );
}

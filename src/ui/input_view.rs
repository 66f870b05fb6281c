use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::App;

const PLACEHOLDER: &str = "Enter\ncontent\nlike\nthis";

/// Text entry: one practice segment per line, long lines are split
pub fn render_input(app: &App, f: &mut Frame) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(3),    // text
            Constraint::Length(1), // status
            Constraint::Length(1), // legend
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(Span::styled(
            "Typing Content",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .block(Block::default().borders(Borders::ALL).title("keyglow"))
        .alignment(Alignment::Center),
        chunks[0],
    );

    let settings = app.practice.settings();
    let text_block = Block::default().borders(Borders::ALL).title(format!(
        "{} lines  |  {} / {}",
        app.input.lines().filter(|l| !l.trim().is_empty()).count(),
        settings.lighting_mode,
        settings.led_color
    ));
    let body = if app.input.is_empty() {
        Paragraph::new(PLACEHOLDER).style(Style::default().fg(Color::DarkGray))
    } else {
        let mut lines: Vec<Line> = app
            .input
            .split('\n')
            .map(|l| Line::from(l.to_string()))
            .collect();
        // cursor marker after the last character
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::styled("▏", Style::default().fg(Color::Yellow)));
        }
        // keep the end of long input in view
        let visible = chunks[1].height.saturating_sub(2) as usize;
        let skip = lines.len().saturating_sub(visible.max(1));
        Paragraph::new(lines.split_off(skip))
    };
    f.render_widget(body.block(text_block).wrap(Wrap { trim: false }), chunks[1]);

    if let Some(status) = &app.status {
        f.render_widget(
            Paragraph::new(status.as_str())
                .style(Style::default().fg(Color::Yellow))
                .alignment(Alignment::Center),
            chunks[2],
        );
    }

    f.render_widget(
        Paragraph::new(Span::styled(
            "(ctrl+s) start / (ctrl+l) clear / (ctrl+t) stats / (esc) quit",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center),
        chunks[3],
    );
}

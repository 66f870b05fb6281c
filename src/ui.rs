pub mod input_view;
pub mod screen;
pub mod stats_view;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use keyglow::fireworks::{hsl_to_rgb, BurstPhase, FireworkOverlay};

use crate::{App, Modal};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;
/// Color of the letter waiting to be typed
const CURRENT_LETTER: Color = Color::Rgb(255, 152, 0);

pub fn draw(app: &mut App, f: &mut Frame) {
    screen::current_screen(&app.state).render(app, f);
}

/// Display screen: the segment, its progress and any open modal
impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let session = self.practice.session();
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(3), // progress
                Constraint::Min(1),    // letters
                Constraint::Length(1), // next / finish hint
                Constraint::Length(1), // legend
            ])
            .split(area);

        let total = session.segments().len();
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .ratio(self.practice.progress().clamp(0.0, 1.0))
            .label(format!(
                "Segment {} / {}",
                (session.segment_index() + 1).min(total.max(1)),
                total
            ));
        gauge.render(chunks[0], buf);

        let padding = self.practice.settings().font_size.cell_padding();
        let line = segment_line(session.current_chars(), session.cursor(), padding);
        let width = line.width().max(1) as u16;
        let max_width = chunks[1].width.max(1);
        let occupied = width.div_ceil(max_width).max(1);
        let top = chunks[1].height.saturating_sub(occupied) / 2;
        let letters_area = Rect {
            y: chunks[1].y + top,
            height: occupied.min(chunks[1].height),
            ..chunks[1]
        };
        Paragraph::new(line)
            .alignment(if occupied == 1 {
                Alignment::Center
            } else {
                Alignment::Left
            })
            .wrap(Wrap { trim: false })
            .render(letters_area, buf);

        if session.is_completed() {
            let hint = if session.has_next_segment() {
                "(enter) next"
            } else {
                "(enter) finish"
            };
            Paragraph::new(Span::styled(hint, bold_style.fg(Color::Green)))
                .alignment(Alignment::Center)
                .render(chunks[2], buf);
        }

        Paragraph::new(Span::styled(
            "(F2) settings / (F3) full text / (ctrl+p) previous / (esc) back",
            italic_style,
        ))
        .render(chunks[3], buf);

        render_fireworks(self.practice.overlay(), area, buf);

        match self.modal {
            Some(Modal::Settings) => render_settings_modal(self, area, buf),
            Some(Modal::FullText) => render_full_text_modal(self, area, buf),
            None => {}
        }
    }
}

/// Typed letters green, the current one orange, the rest dimmed
fn segment_line(chars: &[char], cursor: usize, padding: u16) -> Line<'static> {
    let pad = " ".repeat(padding as usize);
    let typed = Style::default().fg(Color::Green).add_modifier(Modifier::BOLD);
    let current = Style::default()
        .fg(CURRENT_LETTER)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let pending = Style::default().fg(Color::DarkGray);

    let spans = chars
        .iter()
        .enumerate()
        .map(|(idx, &c)| {
            let style = match idx.cmp(&cursor) {
                std::cmp::Ordering::Less => typed,
                std::cmp::Ordering::Equal => current,
                std::cmp::Ordering::Greater => pending,
            };
            let symbol = if c == ' ' && idx == cursor { '·' } else { c };
            Span::styled(format!("{pad}{symbol}{pad}"), style)
        })
        .collect::<Vec<_>>();
    Line::from(spans)
}

/// Draw every burst on top of whatever is already in `buf`
fn render_fireworks(overlay: &FireworkOverlay, area: Rect, buf: &mut Buffer) {
    for burst in overlay.bursts() {
        match &burst.phase {
            BurstPhase::Launch { rocket_y } => {
                let (r, g, b) = hsl_to_rgb(burst.hue, 100.0, 60.0);
                let style = Style::default().fg(Color::Rgb(r, g, b));
                put_cell(area, buf, burst.x, *rocket_y, "|", style);
            }
            BurstPhase::Exploded { particles } => {
                for particle in particles.iter().filter(|p| p.is_visible()) {
                    let (r, g, b) = hsl_to_rgb(particle.hue, 100.0, particle.lightness);
                    let style = Style::default().fg(Color::Rgb(r, g, b));
                    let (symbol, style) = if particle.alpha > 0.7 {
                        ("*", style.add_modifier(Modifier::BOLD))
                    } else if particle.alpha > 0.3 {
                        ("+", style)
                    } else {
                        (".", style.add_modifier(Modifier::DIM))
                    };
                    put_cell(area, buf, particle.x, particle.y, symbol, style);
                }
            }
        }
    }
}

fn put_cell(area: Rect, buf: &mut Buffer, x: f64, y: f64, symbol: &str, style: Style) {
    if x < 0.0 || y < 0.0 {
        return;
    }
    let (x, y) = (x as u16, y as u16);
    if x < area.width && y < area.height {
        if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
            cell.set_symbol(symbol);
            cell.set_style(style);
        }
    }
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_settings_modal(app: &App, area: Rect, buf: &mut Buffer) {
    let settings = app.practice.settings();
    let (r, g, b) = settings.led_color.rgb();
    let bold = Style::default().add_modifier(Modifier::BOLD);

    let sizes = keyglow::settings::FontSize::ALL
        .iter()
        .enumerate()
        .map(|(i, size)| {
            let label = format!("({}) {}  ", i + 1, size);
            if *size == settings.font_size {
                Span::styled(label, bold.fg(Color::Yellow))
            } else {
                Span::raw(label)
            }
        })
        .collect::<Vec<_>>();

    let lines = vec![
        Line::from(Span::styled("Font size", bold)),
        Line::from(sizes),
        Line::default(),
        Line::from(vec![
            Span::raw("(m) Lighting mode: "),
            Span::styled(settings.lighting_mode.to_string(), bold),
        ]),
        Line::from(vec![
            Span::raw("(c) LED color: "),
            Span::styled(settings.led_color.to_string(), bold),
            Span::raw(" "),
            Span::styled("  ", Style::default().bg(Color::Rgb(r, g, b))),
        ]),
        Line::default(),
        Line::from(Span::styled(
            "(esc) close",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ];

    let rect = centered(area, 44, lines.len() as u16 + 2);
    Clear.render(rect, buf);
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Settings"))
        .render(rect, buf);
}

fn render_full_text_modal(app: &App, area: Rect, buf: &mut Buffer) {
    let text = app.practice.session().current_segment();
    let width = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(10);
    let inner = width.saturating_sub(2).max(1);
    let lines = (text.width() as u16).div_ceil(inner).max(1);

    let rect = centered(area, width, lines + 4);
    Clear.render(rect, buf);
    Paragraph::new(vec![
        Line::from(text.to_string()),
        Line::default(),
        Line::from(Span::styled(
            "(esc) close",
            Style::default().add_modifier(Modifier::ITALIC),
        )),
    ])
    .wrap(Wrap { trim: false })
    .block(Block::default().borders(Borders::ALL).title("Current Text"))
    .render(rect, buf);
}

/// Shown after the last segment
pub fn render_success(f: &mut Frame) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(Span::styled(
            "Success!",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        chunks[1],
    );
    f.render_widget(
        Paragraph::new(Span::styled(
            "(enter) return to input",
            Style::default().add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center),
        chunks[3],
    );
}

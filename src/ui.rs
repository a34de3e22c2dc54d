use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    symbols::Marker,
    widgets::{
        Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Widget,
        Wrap,
    },
};
use unicode_width::UnicodeWidthStr;

use tapwpm::{history::CAPACITY, Outcome, Session};

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim_bold() -> Style {
    bold().add_modifier(Modifier::DIM)
}

fn italic() -> Style {
    Style::default().add_modifier(Modifier::ITALIC)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Menu => render_menu(self, area, buf),
            AppState::Typing => match &self.session {
                Some(session) => render_typing(self, session, area, buf),
                None => render_menu(self, area, buf),
            },
            AppState::Results => render_results(self, area, buf),
            AppState::History => render_history(self, area, buf),
            AppState::AddText => render_add_text(self, area, buf),
        }
    }
}

fn render_menu(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2), // title
            Constraint::Length(2), // high score
            Constraint::Min(1),    // passages
            Constraint::Length(1), // message
            Constraint::Length(1), // legend
        ])
        .split(area);

    Paragraph::new(Span::styled("Typing Test", bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    Paragraph::new(Span::styled(
        format!("High Score: {:.2} WPM", app.history.high_score()),
        bold(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[1], buf);

    let entries = std::iter::once("Random").chain(app.texts.sentences().iter().map(String::as_str));
    let lines: Vec<Line> = entries
        .enumerate()
        .map(|(idx, text)| {
            if idx == app.selected {
                Line::from(Span::styled(
                    format!("> {text}"),
                    bold().fg(Color::Yellow),
                ))
            } else {
                Line::from(Span::styled(format!("  {text}"), dim_bold()))
            }
        })
        .collect();

    // keep the selection visible
    let visible = chunks[2].height.saturating_sub(2) as usize;
    let scroll = app.selected.saturating_sub(visible.saturating_sub(1));
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Choose Text"))
        .scroll((scroll as u16, 0))
        .render(chunks[2], buf);

    if let Some(message) = &app.message {
        Paragraph::new(Span::styled(message.as_str(), Style::default().fg(Color::Red)))
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
    }

    Paragraph::new(Span::styled(
        format!(
            "(enter) start selected / (s)topwatch / (c)ountdown {}s / (a)dd text / (h)istory / (esc)ape",
            app.config.countdown_secs
        ),
        italic(),
    ))
    .wrap(Wrap { trim: true })
    .render(chunks[4], buf);
}

/// Passage rendered against the correctness vector, cursor underlined.
pub fn passage_spans(session: &Session) -> Vec<Span<'static>> {
    let green_bold_style = bold().fg(Color::Green);
    let red_bold_style = bold().fg(Color::Red);
    let cursor = session.cursor();

    session
        .passage()
        .chars()
        .zip(session.correctness())
        .enumerate()
        .map(|(idx, (expected, outcome))| match outcome {
            Outcome::Correct => Span::styled(expected.to_string(), green_bold_style),
            Outcome::Incorrect => Span::styled(
                match expected {
                    ' ' => "·".to_owned(),
                    c => c.to_string(),
                },
                red_bold_style,
            ),
            Outcome::Pending if idx == cursor => Span::styled(
                expected.to_string(),
                dim_bold().add_modifier(Modifier::UNDERLINED),
            ),
            Outcome::Pending => Span::styled(expected.to_string(), dim_bold()),
        })
        .collect()
}

fn render_typing(app: &App, session: &Session, area: Rect, buf: &mut Buffer) {
    let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
    let prompt_width = session.passage().width();
    let prompt_occupied_lines = if prompt_width <= max_chars_per_line as usize {
        1
    } else {
        ((prompt_width as f64 / max_chars_per_line as f64).ceil() + 1.0) as u16
    };
    let padding = area.height.saturating_sub(prompt_occupied_lines + 4) / 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(padding),
            Constraint::Length(2), // timer
            Constraint::Length(prompt_occupied_lines),
            Constraint::Length(2), // live wpm
            Constraint::Min(0),
        ])
        .split(area);

    let timer = match session.remaining(app.now) {
        Some(left) => format!("Time Left: {:.2}s", left.as_secs_f64()),
        None => format!("Time: {:.2}s", session.elapsed(app.now).as_secs_f64()),
    };
    Paragraph::new(Span::styled(timer, dim_bold()))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Line::from(passage_spans(session)))
        .alignment(if prompt_occupied_lines == 1 {
            // when the prompt is small enough to fit on one line
            // centering the text gives a nice zen feeling
            Alignment::Center
        } else {
            Alignment::Left
        })
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        format!(
            "{:.0} wpm   (enter) done / (esc) menu",
            session.live_wpm(app.now)
        ),
        italic(),
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3), // stats
            Constraint::Length(1), // ranking
            Constraint::Length(1), // padding
            Constraint::Length(1), // legend
        ])
        .split(area);

    if let Some(result) = app.session.as_ref().and_then(Session::result) {
        Paragraph::new(vec![
            Line::from(Span::styled(
                format!("Final Time: {:.2}s", result.elapsed_secs),
                bold(),
            )),
            Line::from(Span::styled(format!("WPM: {:.2}", result.wpm), bold())),
            Line::from(Span::styled(
                format!("Accuracy: {:.2}%", result.accuracy),
                bold(),
            )),
        ])
        .alignment(Alignment::Center)
        .render(chunks[1], buf);
    }

    let ranking = match (&app.message, &app.last_record) {
        (Some(message), _) => Span::styled(message.clone(), Style::default().fg(Color::Red)),
        (None, Some(_)) => Span::styled(
            format!("Made the top {CAPACITY}!"),
            italic().fg(Color::Cyan),
        ),
        (None, None) => Span::styled(format!("Outside the top {CAPACITY}"), italic()),
    };
    Paragraph::new(ranking)
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

    Paragraph::new(Span::styled(
        "(r)etry / (n)ew / (h)istory / (esc) menu",
        italic(),
    ))
    .render(chunks[4], buf);
}

fn render_add_text(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled("Add Custom Text", bold().fg(Color::Cyan)))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    Paragraph::new(Line::from(vec![
        Span::styled(app.draft.clone(), bold()),
        Span::styled(" ", Style::default().add_modifier(Modifier::REVERSED)),
    ]))
    .block(Block::default().borders(Borders::ALL).title("Text"))
    .wrap(Wrap { trim: false })
    .render(chunks[1], buf);

    Paragraph::new(Span::styled("(enter) save / (esc) cancel", italic())).render(chunks[2], buf);
}

/// X (rank) and Y (wpm) upper bounds for the history chart
fn chart_bounds(series: &[(f64, f64)]) -> (f64, f64) {
    let last_rank = series.last().map_or(1.0, |p| p.0).max(2.0);
    let highest_wpm = series.iter().map(|p| p.1).fold(0.0, f64::max);
    (last_rank, highest_wpm.ceil().max(1.0))
}

fn render_wpm_chart(series: &[(f64, f64)], area: Rect, buf: &mut Buffer) {
    let (last_rank, highest_wpm) = chart_bounds(series);
    let datasets = vec![Dataset::default()
        .marker(Marker::Braille)
        .style(Style::default().fg(Color::Magenta))
        .graph_type(GraphType::Line)
        .data(series)];

    Chart::new(datasets)
        .x_axis(
            Axis::default()
                .title("rank")
                .bounds([1.0, last_rank])
                .labels(vec![
                    Span::styled("1", bold()),
                    Span::styled(format!("{last_rank}"), bold()),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("wpm")
                .bounds([0.0, highest_wpm])
                .labels(vec![
                    Span::styled("0", bold()),
                    Span::styled(format!("{highest_wpm}"), bold()),
                ]),
        )
        .render(area, buf);
}

fn render_history(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(CAPACITY as u16 + 3), // table
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(Span::styled(
        format!("Top {CAPACITY} Scores"),
        bold().fg(Color::Cyan),
    ))
    .alignment(Alignment::Center)
    .render(chunks[0], buf);

    if app.history.is_empty() {
        Paragraph::new(Span::styled("No history yet.", italic()))
            .alignment(Alignment::Center)
            .render(chunks[1], buf);
    } else {
        render_wpm_chart(&app.history.wpm_series(), chunks[1], buf);

        let header = Row::new(vec![
            Cell::from("#"),
            Cell::from("Time Taken (s)"),
            Cell::from("WPM"),
            Cell::from("Accuracy (%)"),
            Cell::from("Date"),
        ])
        .style(bold());

        let rows = app.history.records().iter().enumerate().map(|(i, r)| {
            Row::new(vec![
                Cell::from(format!("{}", i + 1)),
                Cell::from(format!("{:.2}", r.elapsed_secs)),
                Cell::from(format!("{:.2}", r.wpm)),
                Cell::from(format!("{:.2}", r.accuracy)),
                Cell::from(
                    r.timestamp
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default(),
                ),
            ])
        });

        Table::new(
            rows,
            [
                Constraint::Length(3),
                Constraint::Length(15),
                Constraint::Length(8),
                Constraint::Length(13),
                Constraint::Min(16),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL))
        .render(chunks[2], buf);
    }

    Paragraph::new(Span::styled("(esc) menu", italic())).render(chunks[3], buf);
}

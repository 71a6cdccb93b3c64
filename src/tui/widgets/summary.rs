use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::models::Candidate;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let summary = app.session.summary();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Final score
            Constraint::Min(0),    // Failed / successful lists
        ])
        .split(area);

    let timed = app.config.timer.is_some();
    let mut score_lines = vec![Line::from(vec![
        Span::styled("Final score: ", Style::default().fg(Color::Gray)),
        Span::styled(
            summary.score.to_string(),
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
    ])];
    if timed {
        score_lines.push(Line::from(Span::styled(
            "Timed run recorded against your best score",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let score = Paragraph::new(score_lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(" Session Complete "));
    f.render_widget(score, chunks[0]);

    let list_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    draw_card_list(
        f,
        &summary.failed,
        " Missed ",
        Color::Red,
        list_chunks[0],
    );
    draw_card_list(
        f,
        &summary.successful,
        " Correct ",
        Color::Green,
        list_chunks[1],
    );
}

fn draw_card_list(f: &mut Frame, cards: &[Candidate], title: &str, color: Color, area: Rect) {
    let items: Vec<ListItem> = cards
        .iter()
        .map(|c| {
            ListItem::new(Line::from(vec![
                Span::styled(c.prompt.clone(), Style::default().fg(Color::White)),
                Span::styled(
                    format!("  {}", c.expected),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled(
                format!("{}({}) ", title, cards.len()),
                Style::default().fg(color),
            )),
    );
    f.render_widget(list, area);
}

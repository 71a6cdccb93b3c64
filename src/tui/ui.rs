use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::models::GradingMode;
use crate::session::Phase;

use super::widgets::{practice, summary};
use super::App;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    if app.session.is_done() {
        summary::draw(f, app, chunks[1]);
    } else {
        practice::draw(f, app, chunks[1]);
    }
    draw_help_bar(f, app, chunks[2]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled(
            app.config.direction.label(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(
            app.config.policy.as_str(),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    if let Some(view) = app.session.step_view() {
        spans.push(Span::raw("  |  "));
        spans.push(Span::raw(format!("{}/{}", view.position, view.queue_len)));
        if view.pass_number > 1 {
            spans.push(Span::styled(
                format!("  retry pass {}", view.pass_number - 1),
                Style::default().fg(Color::Yellow),
            ));
        }
        spans.push(Span::raw("  |  Score: "));
        spans.push(Span::styled(
            view.score.to_string(),
            Style::default().fg(Color::Green),
        ));
        if let Some(secs) = view.time_remaining {
            let style = if secs <= 10 && view.pass_number == 1 {
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Cyan)
            };
            spans.push(Span::raw("  |  "));
            spans.push(Span::styled(format!("{}s", secs), style));
        }
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" Revoir "));
    f.render_widget(header, area);
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let help_text = if app.session.is_done() {
        vec![
            Span::styled("q/<CR>", Style::default().fg(Color::Cyan)),
            Span::raw(" Close"),
        ]
    } else if app.session.step_view().map(|v| v.save_blocked) == Some(true) {
        vec![
            Span::styled("^r", Style::default().fg(Color::Cyan)),
            Span::raw(" Retry save  "),
            Span::styled("<Esc>", Style::default().fg(Color::Cyan)),
            Span::raw(" Abandon"),
        ]
    } else {
        let mut spans = Vec::new();
        match app.session.grading_mode() {
            GradingMode::ExactMatch => {
                spans.extend(vec![
                    Span::styled("<CR>", Style::default().fg(Color::Cyan)),
                    Span::raw(" Check  "),
                    Span::styled("<Esc>", Style::default().fg(Color::Cyan)),
                    Span::raw(" Quit  "),
                ]);
            }
            GradingMode::SelfGraded => {
                spans.extend(vec![
                    Span::styled("<CR>", Style::default().fg(Color::Cyan)),
                    Span::raw(" Reveal  "),
                    Span::styled("y/n", Style::default().fg(Color::Cyan)),
                    Span::raw(" Grade  "),
                    Span::styled("q", Style::default().fg(Color::Cyan)),
                    Span::raw(" Quit  "),
                ]);
            }
        }
        if app.session.phase() == Phase::TimeUpPendingCurrent {
            spans.extend(vec![
                Span::styled("<CR>", Style::default().fg(Color::Yellow)),
                Span::raw(" Finish"),
            ]);
        }
        spans
    };

    let help = Paragraph::new(Line::from(help_text)).style(Style::default().bg(Color::DarkGray));
    f.render_widget(help, area);
}

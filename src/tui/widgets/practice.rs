use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::models::GradingMode;
use crate::session::{Phase, StepView};
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(view) = app.session.step_view() else {
        let block = Block::default().borders(Borders::ALL).title(" Practice ");
        let paragraph = Paragraph::new("No cards to review.").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Status banners
            Constraint::Length(5), // Prompt
            Constraint::Length(3), // Answer input / reveal
            Constraint::Length(4), // Feedback
            Constraint::Min(0),
        ])
        .split(area);

    draw_banners(f, &view, chunks[0]);
    draw_prompt(f, &view, chunks[1]);
    draw_answer(f, app, &view, chunks[2]);
    draw_feedback(f, &view, chunks[3]);
}

fn draw_banners(f: &mut Frame, view: &StepView, area: Rect) {
    let mut lines = Vec::new();

    if view.phase == Phase::RetryFailed {
        lines.push(Line::from(Span::styled(
            " Retrying missed cards (score is locked) ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )));
    } else if view.phase == Phase::TimeUpPendingCurrent {
        lines.push(Line::from(Span::styled(
            " Time's up! Answer this last card, then press Enter to finish ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        )));
    }

    if view.save_blocked {
        let msg = match view.save_error {
            Some(e) => format!(" Save failed: {} (Ctrl+r to retry) ", e),
            None => " Save failed (Ctrl+r to retry) ".to_string(),
        };
        lines.push(Line::from(Span::styled(
            msg,
            Style::default().fg(Color::White).bg(Color::Red),
        )));
    }

    if !lines.is_empty() {
        f.render_widget(Paragraph::new(lines), area);
    }
}

fn draw_prompt(f: &mut Frame, view: &StepView, area: Rect) {
    let title = match view.mode {
        GradingMode::ExactMatch => " French ",
        GradingMode::SelfGraded => " Korean ",
    };

    let prompt = Paragraph::new(Line::from(Span::styled(
        view.prompt,
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
    .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(prompt, area);
}

fn draw_answer(f: &mut Frame, app: &App, view: &StepView, area: Rect) {
    let (text, title, style) = match view.mode {
        GradingMode::ExactMatch => match view.expected {
            // Graded: show the expected answer instead of the input box.
            Some(expected) => (
                expected.to_string(),
                " Answer ",
                Style::default().fg(Color::Cyan),
            ),
            None => (
                format!("{}_", app.input),
                " Type the Korean ",
                Style::default().fg(Color::White),
            ),
        },
        GradingMode::SelfGraded => match view.expected {
            Some(expected) => (
                expected.to_string(),
                " French ",
                Style::default().fg(Color::Cyan),
            ),
            None => (
                "Press Enter to reveal".to_string(),
                " French ",
                Style::default().fg(Color::DarkGray),
            ),
        },
    };

    let answer = Paragraph::new(Line::from(Span::styled(text, style)))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(answer, area);
}

fn draw_feedback(f: &mut Frame, view: &StepView, area: Rect) {
    let mut lines = Vec::new();

    if view.mode == GradingMode::SelfGraded && view.expected.is_some() {
        lines.push(Line::from(Span::styled(
            "Did you know it? (y/n)",
            Style::default().fg(Color::Yellow),
        )));
    }

    if let Some(was_correct) = view.last_result {
        let (text, color) = if was_correct {
            ("Correct", Color::Green)
        } else {
            ("Incorrect", Color::Red)
        };
        lines.push(Line::from(vec![
            Span::styled(text, Style::default().fg(color).add_modifier(Modifier::BOLD)),
            Span::styled(
                format!("   streak: {}", view.streak),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
    }

    f.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

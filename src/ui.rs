use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::App;
use crate::transcript::{Segment, Speaker};

pub fn draw(frame: &mut Frame, app: &mut App) {
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(frame.area());

    draw_chat(frame, app, chat_area);
    draw_input(frame, app, input_area);
}

fn speaker_style(speaker: Speaker) -> Style {
    match speaker {
        Speaker::User => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        Speaker::Bot => Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
        Speaker::System => Style::default().fg(Color::DarkGray),
    }
}

fn segment_lines(segment: &Segment) -> Vec<Line<'_>> {
    let mut lines = vec![Line::from(Span::styled(
        segment.speaker.label(),
        speaker_style(segment.speaker),
    ))];
    for line in segment.text.lines() {
        lines.push(Line::from(line));
    }
    lines.push(Line::default());
    lines
}

fn draw_chat(frame: &mut Frame, app: &mut App, area: Rect) {
    // Store inner dimensions for scroll calculations (minus borders)
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(format!(" Gemini: {} ", app.model()));

    let text = if app.transcript.is_empty() && !app.is_sending() {
        Text::from(Span::styled(
            "Type a message and press Enter...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for segment in app.transcript.segments() {
            lines.extend(segment_lines(segment));
        }

        if app.is_sending() {
            lines.push(Line::from(Span::styled(
                Speaker::Bot.label(),
                speaker_style(Speaker::Bot),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{dots}"),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.scroll, 0));

    frame.render_widget(chat, area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let (border_color, title) = if app.is_sending() {
        (Color::DarkGray, " Waiting for reply... ")
    } else {
        (Color::Yellow, " Message (Enter to send, Esc to quit) ")
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scroll keeps the cursor inside the inner width
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 {
        0
    } else if app.cursor >= inner_width {
        app.cursor - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);

    frame.render_widget(input, area);

    let cursor_x = (app.cursor - scroll_offset) as u16;
    frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
}

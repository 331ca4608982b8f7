use super::format::format_time;
use crate::audio::{PlaybackState, Playlist, Track};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

const ACCENT: Color = Color::Rgb(29, 185, 84);
const MUTED: Color = Color::Rgb(179, 179, 179);

/// Slides visible in the carousel: the current one plus its neighbours.
/// The carousel does not wrap, so the first and last slides have one
/// neighbour only.
pub fn carousel_slots(len: usize, current: usize) -> Vec<usize> {
    let start = current.saturating_sub(1);
    let end = (current + 1).min(len.saturating_sub(1));
    (start..=end).collect()
}

pub fn render_ui(f: &mut Frame, title: &str, playlist: &Playlist, state: &PlaybackState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(7),    // Artwork carousel
            Constraint::Length(4), // Title + artist
            Constraint::Length(3), // Scrub bar
            Constraint::Length(3), // Controls
            Constraint::Length(1), // Status line
        ])
        .split(f.area());

    render_header(f, chunks[0], title);
    render_carousel(f, chunks[1], playlist, state.current_track_index);
    if let Some(track) = playlist.get(state.current_track_index) {
        render_track_info(f, chunks[2], track);
    }
    render_progress(f, chunks[3], state);
    render_controls(f, chunks[4], state);
    render_status(f, chunks[5], state);
}

fn render_header(f: &mut Frame, area: Rect, title: &str) {
    let header = Paragraph::new(title.to_string())
        .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::BOTTOM));

    f.render_widget(header, area);
}

fn render_carousel(f: &mut Frame, area: Rect, playlist: &Playlist, current: usize) {
    let slots = carousel_slots(playlist.len(), current);
    let constraints: Vec<Constraint> = slots
        .iter()
        .map(|&i| if i == current { Constraint::Percentage(50) } else { Constraint::Percentage(25) })
        .collect();
    let areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (slot_area, &index) in areas.iter().zip(slots.iter()) {
        let Some(track) = playlist.get(index) else {
            continue;
        };
        let is_current = index == current;
        let border_style = if is_current {
            Style::default().fg(ACCENT)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        let art = Paragraph::new(vec![
            Line::from(Span::styled("♫", Style::default().fg(ACCENT).add_modifier(Modifier::BOLD))),
            Line::from(""),
            Line::from(Span::styled(track.artwork_uri.clone(), Style::default().fg(MUTED))),
        ])
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(format!(" {}/{} ", index + 1, playlist.len())),
        );

        f.render_widget(art, *slot_area);
    }
}

fn render_track_info(f: &mut Frame, area: Rect, track: &Track) {
    let info = Paragraph::new(vec![
        Line::from(Span::styled(
            track.display_title(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(track.display_artist(), Style::default().fg(MUTED))),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::NONE));

    f.render_widget(info, area);
}

fn render_progress(f: &mut Frame, area: Rect, state: &PlaybackState) {
    let label = format!(
        "{} / {}",
        format_time(state.position_millis),
        format_time(state.duration_millis)
    );
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL))
        .gauge_style(Style::default().fg(ACCENT).bg(Color::DarkGray))
        .ratio(state.progress_ratio())
        .label(label);

    f.render_widget(gauge, area);
}

fn render_controls(f: &mut Frame, area: Rect, state: &PlaybackState) {
    let center = if state.is_loading() {
        "…"
    } else if state.is_playing {
        "⏸"
    } else {
        "▶"
    };
    let controls = Paragraph::new(Line::from(vec![
        Span::styled("⏮", Style::default().fg(ACCENT)),
        Span::raw("      "),
        Span::styled(
            center,
            Style::default().fg(Color::White).bg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("      "),
        Span::styled("⏭", Style::default().fg(ACCENT)),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::TOP));

    f.render_widget(controls, area);
}

fn render_status(f: &mut Frame, area: Rect, state: &PlaybackState) {
    let line = match &state.last_error {
        Some(error) => Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))),
        None => Line::from(Span::styled(
            "space play/pause · n/b skip · ,/. scrub · [/] swipe · q quit",
            Style::default().fg(Color::DarkGray),
        )),
    };

    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{
        Block, Borders, Clear, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Wrap,
    },
};
use viral_script::{ChannelType, KeySource, Provider, VideoLength, WorkflowStep};
use crate::app::{wrapped_line_count, App, FocusPane, TopicFocus};

pub const TRANSCRIPT_PLACEHOLDER: &str = "떡상한 영상의 대본을 붙여넣으세요. i 키로 입력창에 들어갑니다.";

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, status, footer
    let [header_area, body_area, status_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    app.script_area = None;
    match app.step() {
        WorkflowStep::Input => render_input_screen(app, frame, body_area),
        WorkflowStep::Analyzing | WorkflowStep::Generating => {
            render_loading_screen(app, frame, body_area)
        }
        WorkflowStep::TopicSelection => render_topic_screen(app, frame, body_area),
        WorkflowStep::Result => render_result_screen(app, frame, body_area),
    }

    render_status(app, frame, status_area);
    render_footer(app, frame, footer_area);

    // Render popups (in order of priority)
    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_provider_picker {
        render_provider_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let key_status = match app.config.key_source() {
        Some(source) => Span::styled(
            format!(" key: {} ", source.label()),
            Style::default().fg(Color::Green),
        ),
        None => Span::styled(" key: 미설정 ", Style::default().fg(Color::Red)),
    };

    let title = Line::from(vec![
        Span::styled(" 떡상 대본 생성기 ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {}: {} ", app.config.provider.display_name(), app.config.model_or_default()),
            Style::default().fg(Color::White),
        ),
        key_status,
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_status(app: &App, frame: &mut Frame, area: Rect) {
    let line = match (app.workflow.error(), app.notice.as_deref()) {
        (Some(error), _) => Line::from(Span::styled(
            format!(" ⚠ {}", error),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        (None, Some(notice)) => Line::from(Span::styled(
            format!(" {}", notice),
            Style::default().fg(Color::Green),
        )),
        (None, None) => Line::default(),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.step() {
        WorkflowStep::Input => (" INPUT ", Style::default().bg(Color::Blue).fg(Color::White)),
        WorkflowStep::Analyzing => (" ANALYZING ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        WorkflowStep::TopicSelection => (" TOPIC ", Style::default().bg(Color::Magenta).fg(Color::White)),
        WorkflowStep::Generating => (" GENERATING ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        WorkflowStep::Result => (" RESULT ", Style::default().bg(Color::Green).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let pairs: Vec<(&str, &str)> = match app.step() {
        WorkflowStep::Input => match app.focus {
            FocusPane::Transcript => vec![
                ("Ctrl+S", "analyze"),
                ("Tab", "focus"),
                ("Esc", "stop typing"),
                ("Ctrl+U", "clear"),
            ],
            FocusPane::Channel | FocusPane::Length => vec![
                ("h/l", "change"),
                ("Tab", "focus"),
                ("Ctrl+S", "analyze"),
                ("p", "provider"),
                ("k", "API key"),
                ("q", "quit"),
            ],
            FocusPane::History => vec![
                ("j/k", "nav"),
                ("Enter", "open"),
                ("d", "delete"),
                ("Tab", "focus"),
                ("p", "provider"),
                ("K", "API key"),
                ("q", "quit"),
            ],
        },
        WorkflowStep::Analyzing | WorkflowStep::Generating => vec![("Ctrl+C", "quit")],
        WorkflowStep::TopicSelection => match app.topic_focus {
            TopicFocus::Suggestions => vec![
                ("1-5", "pick"),
                ("j/k", "nav"),
                ("Enter", "generate"),
                ("Tab", "own topic"),
                ("Esc", "back"),
            ],
            TopicFocus::Custom => vec![("Enter", "generate"), ("Esc", "suggestions")],
        },
        WorkflowStep::Result => vec![
            ("j/k", "scroll"),
            ("c", "copy"),
            ("r", "new script"),
            ("p", "provider"),
            ("q", "quit"),
        ],
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(pairs.into_iter().flat_map(|(k, l)| hint(k, l)))
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn border_color(focused: bool) -> Color {
    if focused {
        Color::Cyan
    } else {
        Color::DarkGray
    }
}

fn render_input_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [side_area, transcript_area] = Layout::horizontal([
        Constraint::Percentage(35),
        Constraint::Percentage(65),
    ])
    .areas(area);

    let [channel_area, length_area, history_area] = Layout::vertical([
        Constraint::Length(4),
        Constraint::Length(4),
        Constraint::Min(0),
    ])
    .areas(side_area);

    let video = app.video();
    let channel_labels: Vec<&str> = ChannelType::all().iter().map(|c| c.label()).collect();
    render_selector(
        frame,
        channel_area,
        " 채널 유형 ",
        &channel_labels,
        video.channel_type.label(),
        video.channel_type.description(),
        app.focus == FocusPane::Channel,
    );
    let length_labels: Vec<&str> = VideoLength::all().iter().map(|l| l.label()).collect();
    render_selector(
        frame,
        length_area,
        " 영상 길이 ",
        &length_labels,
        video.video_length.label(),
        video.video_length.description(),
        app.focus == FocusPane::Length,
    );

    render_history(app, frame, history_area);
    render_transcript(app, frame, transcript_area);
}

fn render_selector(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    labels: &[&str],
    selected: &str,
    description: &str,
    focused: bool,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(focused)))
        .title(title.to_string());

    let mut spans = Vec::new();
    for label in labels {
        let style = if *label == selected {
            Style::default().bg(Color::Blue).fg(Color::White).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(format!(" {} ", label), style));
        spans.push(Span::raw(" "));
    }

    let text = Text::from(vec![
        Line::from(spans),
        Line::from(Span::styled(description.to_string(), Style::default().fg(Color::DarkGray))),
    ]);
    frame.render_widget(Paragraph::new(text).block(block), area);
}

fn render_history(app: &mut App, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(app.focus == FocusPane::History)))
        .title(format!(" 생성 기록 ({}) ", app.history.len()));

    if app.history.is_empty() {
        let empty = Paragraph::new("아직 생성된 대본이 없습니다.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem> = app
        .history
        .items()
        .iter()
        .map(|item| {
            ListItem::new(Text::from(vec![
                Line::from(item.topic.clone()),
                Line::from(Span::styled(item.date.clone(), Style::default().fg(Color::DarkGray))),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.history_state);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Transcript;
    let transcript = &app.workflow.transcript;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::DarkGray }))
        .title(format!(" 기존 대본 ({}자) ", transcript.chars().count()));

    let text = if transcript.is_empty() && !focused {
        Text::from(Span::styled(
            TRANSCRIPT_PLACEHOLDER,
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        text_with_cursor(transcript, focused.then_some(app.transcript_cursor))
    };

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2);
    let total = wrapped_line_count(transcript, inner_width).max(1);
    app.transcript_scroll = app.transcript_scroll.min(total.saturating_sub(inner_height));

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.transcript_scroll, 0));
    frame.render_widget(paragraph, area);
}

/// Render `text` with a block cursor at char index `cursor`
fn text_with_cursor(text: &str, cursor: Option<usize>) -> Text<'static> {
    let cursor_style = Style::default().bg(Color::Yellow).fg(Color::Black);
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut offset = 0usize;

    for raw in text.split('\n') {
        let len = raw.chars().count();
        let line = match cursor {
            Some(c) if c >= offset && c <= offset + len => {
                let at = c - offset;
                let before: String = raw.chars().take(at).collect();
                let current: String = raw.chars().nth(at).map(String::from).unwrap_or_else(|| " ".to_string());
                let after: String = raw.chars().skip(at + 1).collect();
                Line::from(vec![
                    Span::raw(before),
                    Span::styled(current, cursor_style),
                    Span::raw(after),
                ])
            }
            _ => Line::from(raw.to_string()),
        };
        lines.push(line);
        offset += len + 1; // newline
    }

    Text::from(lines)
}

fn render_loading_screen(app: &App, frame: &mut Frame, area: Rect) {
    let spinner = SPINNER[app.animation_frame % SPINNER.len()];
    let dots = ".".repeat(app.animation_frame / 3 % 3 + 1);
    let message = match app.step() {
        WorkflowStep::Analyzing => "떡상 대본을 분석하고 있습니다",
        _ => "새로운 대본을 작성하고 있습니다",
    };

    let mut lines = vec![
        Line::default(),
        Line::from(Span::styled(
            format!("{} {}{}", spinner, message, dots),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(Span::styled(
            format!(
                "{} ({})",
                app.config.provider.display_name(),
                app.config.model_or_default()
            ),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if app.step() == WorkflowStep::Generating {
        lines.push(Line::from(Span::styled(
            format!("주제: {}", app.workflow.selected_topic()),
            Style::default().fg(Color::Cyan),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_summary(summary: &str, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta))
        .title(" 떡상 요인 분석 ");
    let paragraph = Paragraph::new(summary.to_string())
        .block(block)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

fn render_topic_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [summary_area, topics_area, custom_area] = Layout::vertical([
        Constraint::Percentage(40),
        Constraint::Min(4),
        Constraint::Length(3),
    ])
    .areas(area);

    render_summary(app.workflow.analysis_summary().unwrap_or_default(), frame, summary_area);

    let suggestions_focused = app.topic_focus == TopicFocus::Suggestions;
    let topics_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color(suggestions_focused)))
        .title(" 추천 주제 (1-5 또는 Enter로 선택) ");

    let items: Vec<ListItem> = app
        .workflow
        .suggested_topics()
        .iter()
        .enumerate()
        .map(|(i, topic)| ListItem::new(format!(" {}. {} ", i + 1, topic)))
        .collect();

    let list = List::new(items)
        .block(topics_block)
        .highlight_style(
            Style::default()
                .bg(Color::Magenta)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, topics_area, &mut app.topic_state);

    let custom_focused = app.topic_focus == TopicFocus::Custom;
    let custom_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if custom_focused { Color::Yellow } else { Color::DarkGray }))
        .title(" 직접 입력 (Tab) ");

    // Horizontal scroll keeps the cursor inside the field
    let inner_width = custom_area.width.saturating_sub(2) as usize;
    let scroll_offset = app
        .custom_topic_cursor
        .saturating_sub(inner_width.saturating_sub(1));
    let visible: String = app.custom_topic.chars().skip(scroll_offset).take(inner_width).collect();

    frame.render_widget(Paragraph::new(visible).block(custom_block), custom_area);

    if custom_focused && inner_width > 0 {
        let cursor_x = (app.custom_topic_cursor - scroll_offset) as u16;
        frame.set_cursor_position((custom_area.x + 1 + cursor_x, custom_area.y + 1));
    }
}

fn render_result_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [summary_area, script_area] = Layout::vertical([
        Constraint::Percentage(30),
        Constraint::Percentage(70),
    ])
    .areas(area);

    render_summary(app.workflow.analysis_summary().unwrap_or_default(), frame, summary_area);

    let script = app.workflow.final_script().unwrap_or_default().to_string();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green))
        .title(format!(" 새 대본: {} ", app.workflow.selected_topic()))
        .title_bottom(Line::from(format!(" {}자 ", script.chars().count())).right_aligned());

    app.result_height = script_area.height.saturating_sub(2);
    app.result_width = script_area.width.saturating_sub(3);
    app.script_area = Some(script_area);
    let total = wrapped_line_count(&script, app.result_width as usize);

    let paragraph = Paragraph::new(script)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.result_scroll, 0));
    frame.render_widget(paragraph, script_area);

    if total > app.result_height {
        let mut scrollbar_state = ScrollbarState::new(total.saturating_sub(app.result_height) as usize)
            .position(app.result_scroll as usize);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            script_area,
            &mut scrollbar_state,
        );
    }
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

fn render_provider_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let providers = Provider::all();
    let popup_area = centered_popup(area, 50, providers.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Provider ");

    let items: Vec<ListItem> = providers
        .iter()
        .map(|provider| {
            let key_source = app.key_source(*provider);
            let is_current = *provider == app.config.provider;

            let status = match key_source {
                Some(KeySource::Env) => "(env var)",
                Some(KeySource::Config) => "(configured)",
                None => "(needs key)",
            };
            let prefix = if is_current { "* " } else { "  " };

            let style = if is_current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else if key_source.is_some() {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };

            ListItem::new(format!("{}{} {}", prefix, provider.display_name(), status)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.provider_picker_state);
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let provider = app.api_key_target_provider.unwrap_or(app.config.provider);
    let popup_area = centered_popup(area, 64, 8);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(format!(" Enter API Key for {} ", provider.display_name()));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Paste your API key below. Press Enter to save, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, Rect::new(inner.x, inner.y, inner.width, 1));

    let input_area = Rect::new(inner.x, inner.y + 2, inner.width, 1);
    let display_text = mask(&app.api_key_input);
    frame.render_widget(
        Paragraph::new(display_text.clone()).style(Style::default().fg(Color::Cyan)),
        input_area,
    );

    let cursor_x = display_text.chars().count().min(input_area.width as usize) as u16;
    frame.set_cursor_position((input_area.x + cursor_x, input_area.y));

    let status = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("{} characters  ", app.api_key_input.chars().count()),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(provider.key_url(), Style::default().fg(Color::Blue).underlined()),
    ]));
    frame.render_widget(status, Rect::new(inner.x, inner.y + 4, inner.width, 1));
}

/// Mask a key with asterisks, showing the last four characters
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let last_four: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", "*".repeat((chars.len() - 4).min(20)), last_four)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use std::sync::Arc;
    use viral_script::MemoryStore;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_text_with_cursor_marks_position() {
        let text = text_with_cursor("ab\ncd", Some(3));
        assert_eq!(text.lines.len(), 2);
        assert_eq!(text.lines[1].spans[1].content, "c");

        let end = text_with_cursor("ab", Some(2));
        assert_eq!(end.lines[0].spans[1].content, " ");
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask(""), "");
        assert_eq!(mask("abcd"), "****");
        assert_eq!(mask("sk-abcdef"), "*****...cdef");
    }

    #[test]
    fn test_render_every_step_without_panicking() {
        let mut app = App::new(Arc::new(MemoryStore::new())).unwrap();
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();

        terminal.draw(|f| render(&mut app, f)).unwrap();
        assert!(buffer_text(&terminal).contains("INPUT"));

        app.workflow.select_history(&viral_script::HistoryItem {
            id: "1".to_string(),
            date: "2024. 01. 01. 00:00:00".to_string(),
            topic: "topic".to_string(),
            script: "line\n".repeat(100),
            analysis: "summary".to_string(),
        });
        terminal.draw(|f| render(&mut app, f)).unwrap();
        assert!(buffer_text(&terminal).contains("RESULT"));
        assert!(app.script_area.is_some());

        app.open_provider_picker();
        terminal.draw(|f| render(&mut app, f)).unwrap();
        assert!(buffer_text(&terminal).contains("Select Provider"));
    }
}

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use viral_script::{
    ai, CallKind, PendingCall, ScriptResult, TopicSuggestion, WorkflowStep,
};
use crate::app::{App, FocusPane, TopicFocus};
use crate::tui::{AiOutcome, AppEvent};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Ai(outcome) => handle_ai_outcome(app, outcome),
    }
    Ok(())
}

fn handle_ai_outcome(app: &mut App, outcome: AiOutcome) {
    match outcome {
        AiOutcome::Analysis(result) => {
            if app.workflow.finish_analysis(result)
                && app.step() == WorkflowStep::TopicSelection
            {
                app.enter_topic_selection();
            }
        }
        AiOutcome::Script(result) => {
            if app.workflow.finish_generation(result, &mut app.history)
                && app.step() == WorkflowStep::Result
            {
                app.enter_result();
            }
        }
    }
}

/// Run the provider call on a background task and report back as an event.
fn spawn_call(app: &App, call: PendingCall, tx: &UnboundedSender<AppEvent>) {
    let client = ai::create_client(&app.config);
    let tx = tx.clone();
    tokio::spawn(async move {
        let outcome = match call.kind {
            CallKind::Analyze => {
                AiOutcome::Analysis(ai::invoke::<TopicSuggestion>(client.as_ref(), &call.prompt).await)
            }
            CallKind::Generate => {
                AiOutcome::Script(ai::invoke::<ScriptResult>(client.as_ref(), &call.prompt).await)
            }
        };
        if tx.send(AppEvent::Ai(outcome)).is_err() {
            log::debug!("event loop closed before provider call finished");
        }
    });
}

fn submit(app: &mut App, tx: &UnboundedSender<AppEvent>) {
    app.notice = None;
    match app.workflow.submit(&app.config) {
        Ok(call) => spawn_call(app, call, tx),
        Err(e) => log::debug!("submit rejected: {:?}", e),
    }
}

fn generate(app: &mut App, topic: &str, tx: &UnboundedSender<AppEvent>) {
    app.notice = None;
    match app.workflow.begin_generation(topic, &app.config) {
        Ok(call) => spawn_call(app, call, tx),
        Err(e) => log::debug!("generation rejected: {:?}", e),
    }
}

fn is_submit_key(key: &KeyEvent) -> bool {
    key.code == KeyCode::F(5)
        || (key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL))
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    if app.show_api_key_input {
        return handle_api_key_input(app, key);
    }
    if app.show_provider_picker {
        return handle_provider_picker(app, key);
    }

    match app.step() {
        WorkflowStep::Input => handle_input_step(app, key, tx)?,
        WorkflowStep::Analyzing | WorkflowStep::Generating => {
            if key.code == KeyCode::Char('q') {
                app.should_quit = true;
            }
        }
        WorkflowStep::TopicSelection => handle_topic_step(app, key, tx),
        WorkflowStep::Result => handle_result_step(app, key),
    }
    Ok(())
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => app.close_api_key_input(),
        KeyCode::Enter => {
            if let Err(e) = app.save_api_key() {
                log::error!("could not save API key: {:#}", e);
                app.notice = Some(format!("설정을 저장하지 못했습니다: {}", e));
            }
        }
        KeyCode::Backspace => {
            if app.api_key_input_cursor > 0 {
                app.api_key_input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
                app.api_key_input.remove(byte_pos);
            }
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
            app.api_key_input.insert(byte_pos, c);
            app.api_key_input_cursor += 1;
        }
        KeyCode::Left => {
            app.api_key_input_cursor = app.api_key_input_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.api_key_input.chars().count();
            app.api_key_input_cursor = (app.api_key_input_cursor + 1).min(char_count);
        }
        _ => {}
    }
    Ok(())
}

fn handle_provider_picker(app: &mut App, key: KeyEvent) -> Result<()> {
    match key.code {
        KeyCode::Esc => app.show_provider_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.provider_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.provider_picker_nav_up(),
        KeyCode::Enter => {
            if let Err(e) = app.choose_provider() {
                log::error!("could not save provider: {:#}", e);
                app.notice = Some(format!("설정을 저장하지 못했습니다: {}", e));
            }
        }
        _ => {}
    }
    Ok(())
}

fn handle_input_step(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    if is_submit_key(&key) {
        submit(app, tx);
        return Ok(());
    }
    if key.code == KeyCode::Tab {
        app.focus = app.focus.next();
        return Ok(());
    }

    if app.focus == FocusPane::Transcript {
        handle_transcript_editing(app, key);
        return Ok(());
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('p') => app.open_provider_picker(),
        KeyCode::Char('k') if app.focus != FocusPane::History => {
            app.open_api_key_input(app.config.provider);
        }
        KeyCode::Char('K') => app.open_api_key_input(app.config.provider),
        KeyCode::Char('i') => app.focus = FocusPane::Transcript,
        _ => match app.focus {
            FocusPane::Channel => match key.code {
                KeyCode::Char('h') | KeyCode::Left => app.cycle_channel(false),
                KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => app.cycle_channel(true),
                _ => {}
            },
            FocusPane::Length => match key.code {
                KeyCode::Char('h') | KeyCode::Left => app.cycle_length(false),
                KeyCode::Char('l') | KeyCode::Right | KeyCode::Enter => app.cycle_length(true),
                _ => {}
            },
            FocusPane::History => match key.code {
                KeyCode::Char('j') | KeyCode::Down => app.history_nav_down(),
                KeyCode::Char('k') | KeyCode::Up => app.history_nav_up(),
                KeyCode::Enter => app.open_selected_history(),
                KeyCode::Char('d') | KeyCode::Delete => {
                    if let Err(e) = app.delete_selected_history() {
                        log::error!("could not delete history item: {:#}", e);
                        app.notice = Some(format!("기록을 삭제하지 못했습니다: {}", e));
                    }
                }
                _ => {}
            },
            FocusPane::Transcript => {}
        },
    }
    Ok(())
}

fn handle_transcript_editing(app: &mut App, key: KeyEvent) {
    let text = &mut app.workflow.transcript;
    match key.code {
        KeyCode::Esc => app.focus = FocusPane::Channel,
        KeyCode::Enter => {
            let byte_pos = char_to_byte_index(text, app.transcript_cursor);
            text.insert(byte_pos, '\n');
            app.transcript_cursor += 1;
        }
        KeyCode::Backspace => {
            if app.transcript_cursor > 0 {
                app.transcript_cursor -= 1;
                let byte_pos = char_to_byte_index(text, app.transcript_cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if app.transcript_cursor < text.chars().count() {
                let byte_pos = char_to_byte_index(text, app.transcript_cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.transcript_cursor = app.transcript_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            app.transcript_cursor = (app.transcript_cursor + 1).min(text.chars().count());
        }
        KeyCode::Home => app.transcript_cursor = 0,
        KeyCode::End => app.transcript_cursor = text.chars().count(),
        KeyCode::Up => app.transcript_scroll = app.transcript_scroll.saturating_sub(1),
        KeyCode::Down => app.transcript_scroll = app.transcript_scroll.saturating_add(1),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            text.clear();
            app.transcript_cursor = 0;
            app.transcript_scroll = 0;
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(text, app.transcript_cursor);
            text.insert(byte_pos, c);
            app.transcript_cursor += 1;
        }
        _ => {}
    }
}

fn handle_paste(app: &mut App, pasted: &str) {
    let pasted = pasted.replace("\r\n", "\n").replace('\r', "\n");
    if app.show_api_key_input {
        let clean = pasted.trim();
        let byte_pos = char_to_byte_index(&app.api_key_input, app.api_key_input_cursor);
        app.api_key_input.insert_str(byte_pos, clean);
        app.api_key_input_cursor += clean.chars().count();
        return;
    }

    match app.step() {
        WorkflowStep::Input => {
            app.focus = FocusPane::Transcript;
            let byte_pos = char_to_byte_index(&app.workflow.transcript, app.transcript_cursor);
            app.workflow.transcript.insert_str(byte_pos, &pasted);
            app.transcript_cursor += pasted.chars().count();
        }
        WorkflowStep::TopicSelection => {
            let line = pasted.lines().next().unwrap_or_default();
            app.topic_focus = TopicFocus::Custom;
            let byte_pos = char_to_byte_index(&app.custom_topic, app.custom_topic_cursor);
            app.custom_topic.insert_str(byte_pos, line);
            app.custom_topic_cursor += line.chars().count();
        }
        _ => {}
    }
}

fn handle_topic_step(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    match app.topic_focus {
        TopicFocus::Suggestions => match key.code {
            KeyCode::Char('q') => app.should_quit = true,
            KeyCode::Esc => app.workflow.back_to_input(),
            KeyCode::Tab | KeyCode::Char('i') => app.topic_focus = TopicFocus::Custom,
            KeyCode::Char('j') | KeyCode::Down => app.topic_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.topic_nav_up(),
            KeyCode::Char('p') => app.open_provider_picker(),
            KeyCode::Enter => {
                if let Some(topic) = app.selected_topic() {
                    generate(app, &topic, tx);
                }
            }
            KeyCode::Char(c @ '1'..='5') => {
                let idx = c as usize - '1' as usize;
                if let Some(topic) = app.workflow.suggested_topics().get(idx).cloned() {
                    app.topic_state.select(Some(idx));
                    generate(app, &topic, tx);
                }
            }
            _ => {}
        },
        TopicFocus::Custom => match key.code {
            KeyCode::Esc | KeyCode::Tab => app.topic_focus = TopicFocus::Suggestions,
            KeyCode::Enter => {
                let topic = app.custom_topic.clone();
                generate(app, &topic, tx);
            }
            KeyCode::Backspace => {
                if app.custom_topic_cursor > 0 {
                    app.custom_topic_cursor -= 1;
                    let byte_pos = char_to_byte_index(&app.custom_topic, app.custom_topic_cursor);
                    app.custom_topic.remove(byte_pos);
                }
            }
            KeyCode::Left => {
                app.custom_topic_cursor = app.custom_topic_cursor.saturating_sub(1);
            }
            KeyCode::Right => {
                let char_count = app.custom_topic.chars().count();
                app.custom_topic_cursor = (app.custom_topic_cursor + 1).min(char_count);
            }
            KeyCode::Home => app.custom_topic_cursor = 0,
            KeyCode::End => app.custom_topic_cursor = app.custom_topic.chars().count(),
            KeyCode::Char(c) => {
                let byte_pos = char_to_byte_index(&app.custom_topic, app.custom_topic_cursor);
                app.custom_topic.insert(byte_pos, c);
                app.custom_topic_cursor += 1;
            }
            _ => {}
        },
    }
}

fn handle_result_step(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('r') | KeyCode::Esc => app.reset(),
        KeyCode::Char('c') => {
            if let Some(script) = app.workflow.final_script() {
                app.notice = Some(match copy_to_clipboard(script) {
                    Ok(tool) => {
                        log::info!("copied script with {}", tool);
                        "대본이 클립보드에 복사되었습니다.".to_string()
                    }
                    Err(e) => {
                        log::warn!("clipboard copy failed: {:#}", e);
                        "클립보드에 복사하지 못했습니다.".to_string()
                    }
                });
            }
        }
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.result_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.result_height / 2);
        }
        KeyCode::PageDown => app.scroll_down(app.result_height),
        KeyCode::PageUp => app.scroll_up(app.result_height),
        KeyCode::Char('g') => app.result_scroll = 0,
        KeyCode::Char('G') => app.scroll_to_bottom(),
        KeyCode::Char('p') => app.open_provider_picker(),
        _ => {}
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_script = app
        .script_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);

    match (app.step(), mouse.kind) {
        (WorkflowStep::Result, MouseEventKind::ScrollDown) if in_script => app.scroll_down(3),
        (WorkflowStep::Result, MouseEventKind::ScrollUp) if in_script => app.scroll_up(3),
        (WorkflowStep::Input, MouseEventKind::ScrollDown) => {
            if app.focus == FocusPane::History {
                app.history_nav_down();
            } else {
                app.transcript_scroll = app.transcript_scroll.saturating_add(3);
            }
        }
        (WorkflowStep::Input, MouseEventKind::ScrollUp) => {
            if app.focus == FocusPane::History {
                app.history_nav_up();
            } else {
                app.transcript_scroll = app.transcript_scroll.saturating_sub(3);
            }
        }
        (WorkflowStep::TopicSelection, MouseEventKind::ScrollDown) => app.topic_nav_down(),
        (WorkflowStep::TopicSelection, MouseEventKind::ScrollUp) => app.topic_nav_up(),
        _ => {}
    }
}

type ClipboardTool = (&'static str, &'static [&'static str]);

const CLIPBOARD_TOOLS: [ClipboardTool; 4] = [
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
];

fn copy_to_clipboard(text: &str) -> Result<&'static str> {
    pipe_to_first(&CLIPBOARD_TOOLS, text)
        .ok_or_else(|| anyhow::anyhow!("no clipboard tool found (tried pbcopy, wl-copy, xclip, xsel)"))
}

/// Pipe `text` into the first tool that accepts it. Every spawned child is
/// waited on, including ones whose stdin broke mid-write.
fn pipe_to_first(tools: &[ClipboardTool], text: &str) -> Option<&'static str> {
    use std::io::Write;
    use std::process::{Command, Stdio};

    for &(tool, args) in tools {
        let Ok(mut child) = Command::new(tool)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        else {
            continue;
        };

        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(text.as_bytes()),
            None => Ok(()),
        };
        let status = child.wait();

        match (written, status) {
            (Ok(()), Ok(status)) if status.success() => return Some(tool),
            (Err(e), _) => log::debug!("{} closed its input: {}", tool, e),
            (_, Err(e)) => log::debug!("could not wait for {}: {}", tool, e),
            (_, Ok(status)) => log::debug!("{} exited with {}", tool, status),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use viral_script::{AiError, MemoryStore, Provider};

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn app() -> App {
        App::new(Arc::new(MemoryStore::new())).unwrap()
    }

    #[test]
    fn test_char_to_byte_index_handles_hangul() {
        assert_eq!(char_to_byte_index("가나다", 1), 3);
        assert_eq!(char_to_byte_index("가나다", 5), 9);
    }

    #[test]
    fn test_typing_and_paste_edit_transcript() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = app();
        for c in ['가', '나'] {
            handle_event(&mut app, key(KeyCode::Char(c)), &tx).unwrap();
        }
        handle_event(&mut app, key(KeyCode::Left), &tx).unwrap();
        handle_event(&mut app, AppEvent::Paste("X\r\nY".to_string()), &tx).unwrap();
        handle_event(&mut app, key(KeyCode::Backspace), &tx).unwrap();

        assert_eq!(app.workflow.transcript, "가X\n나");
        assert_eq!(app.transcript_cursor, 3);
    }

    #[test]
    fn test_submit_without_key_stays_on_input() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = app();
        app.config = viral_script::AiConfig::new(Provider::Gemini, "");
        app.workflow.transcript = "대본".to_string();

        handle_event(&mut app, key(KeyCode::F(5)), &tx).unwrap();

        assert_eq!(app.step(), WorkflowStep::Input);
        assert_eq!(app.status_message(), Some("먼저 AI API 키를 설정해주세요."));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_analysis_outcome_enters_topic_selection() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = app();
        app.config = viral_script::AiConfig::new(Provider::OpenAI, "k");
        app.workflow.transcript = "대본".to_string();
        app.workflow.begin_analysis(&app.config).unwrap();

        let outcome = AiOutcome::Analysis(Ok(TopicSuggestion {
            analysis_summary: "a".to_string(),
            suggested_topics: vec!["t1".to_string(), "t2".to_string()],
        }));
        handle_event(&mut app, AppEvent::Ai(outcome), &tx).unwrap();

        assert_eq!(app.step(), WorkflowStep::TopicSelection);
        assert_eq!(app.topic_state.selected(), Some(0));

        handle_event(&mut app, key(KeyCode::Esc), &tx).unwrap();
        assert_eq!(app.step(), WorkflowStep::Input);
    }

    #[test]
    fn test_failed_generation_outcome_keeps_history_empty() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = app();
        app.config = viral_script::AiConfig::new(Provider::OpenAI, "k");
        app.workflow.transcript = "대본".to_string();
        app.workflow.begin_analysis(&app.config).unwrap();
        app.workflow.finish_analysis(Ok(TopicSuggestion {
            analysis_summary: "a".to_string(),
            suggested_topics: vec!["t1".to_string()],
        }));
        app.workflow.begin_generation("t1", &app.config).unwrap();

        let outcome = AiOutcome::Script(Err(AiError::EmptyResponse {
            provider: Provider::OpenAI,
        }));
        handle_event(&mut app, AppEvent::Ai(outcome), &tx).unwrap();

        assert_eq!(app.step(), WorkflowStep::TopicSelection);
        assert!(app.history.is_empty());
    }

    #[test]
    fn test_keys_ignored_while_loading() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = app();
        app.config = viral_script::AiConfig::new(Provider::OpenAI, "k");
        app.workflow.transcript = "대본".to_string();
        app.workflow.begin_analysis(&app.config).unwrap();

        handle_event(&mut app, key(KeyCode::F(5)), &tx).unwrap();
        handle_event(&mut app, key(KeyCode::Char('p')), &tx).unwrap();

        assert_eq!(app.step(), WorkflowStep::Analyzing);
        assert!(!app.show_provider_picker);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_placeholder_key_focuses_transcript() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = app();
        app.focus = FocusPane::Channel;

        assert!(crate::ui::TRANSCRIPT_PLACEHOLDER.contains("i 키"));
        handle_event(&mut app, key(KeyCode::Char('i')), &tx).unwrap();
        assert_eq!(app.focus, FocusPane::Transcript);

        // Tab leaves the editor rather than entering it
        handle_event(&mut app, key(KeyCode::Tab), &tx).unwrap();
        assert_ne!(app.focus, FocusPane::Transcript);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_pipe_moves_on_to_next_tool() {
        // `true` exits without reading, so a write larger than the pipe
        // buffer fails with a broken pipe
        let text = "x".repeat(1 << 20);
        let tools: [ClipboardTool; 3] = [("no-such-clipboard-tool", &[]), ("true", &[]), ("cat", &[])];
        assert_eq!(pipe_to_first(&tools, &text), Some("cat"));
        assert_eq!(pipe_to_first(&tools[..2], &text), None);
    }
}

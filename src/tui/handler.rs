//! Async event handler for the editor TUI.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{info, warn};
use wren_live::{store::SourceStore, supervisor::EventReceiver, Supervisor, SupervisorSettings};

use super::{
    app::App,
    events::{KeyOutcome, TuiEvent},
    ui::render_ui,
};

/// Source shown when there is no file and nothing stored.
pub const DEFAULT_SOURCE: &str = "System.print(\"Hello Wren\")";

/// Run the editor with a live preview pane.
pub async fn run_tui(
    settings: SupervisorSettings,
    store: SourceStore,
    file: Option<PathBuf>,
) -> Result<()> {
    if !io::IsTerminal::is_terminal(&io::stdout()) {
        return Err(anyhow::anyhow!("TUI mode requires a proper terminal environment"));
    }

    let initial = initial_source(file.as_ref(), &store)?;
    let mut app = App::new(&initial, file);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (mut supervisor, events) = Supervisor::new(settings);
    let result = run_app(&mut terminal, &mut app, &mut supervisor, events, &store).await;
    supervisor.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    terminal.backend_mut().execute(DisableBracketedPaste)?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn initial_source(file: Option<&PathBuf>, store: &SourceStore) -> Result<String> {
    if let Some(path) = file {
        if path.exists() {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
        return Ok(String::new());
    }
    Ok(store.load().unwrap_or_else(|| DEFAULT_SOURCE.to_string()))
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    supervisor: &mut Supervisor,
    mut events: EventReceiver,
    store: &SourceStore,
) -> Result<()> {
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<TuiEvent>();
    let stop = Arc::new(AtomicBool::new(false));
    let reader_stop = Arc::clone(&stop);

    // Spawn input handler
    tokio::task::spawn_blocking(move || {
        while !reader_stop.load(Ordering::Relaxed) {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let forwarded = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => TuiEvent::Key(key),
                Ok(Event::Paste(text)) => TuiEvent::Paste(text),
                Ok(Event::Resize(_, _)) => TuiEvent::Resize,
                _ => continue,
            };
            if input_tx.send(forwarded).is_err() {
                break; // Channel closed
            }
        }
    });

    submit(app, supervisor, store);

    let result = loop {
        if let Err(e) = terminal.draw(|frame| render_ui(frame, app)) {
            break Err(e.into());
        }

        tokio::select! {
            Some(input) = input_rx.recv() => {
                let outcome = match input {
                    TuiEvent::Key(key) => handle_key_event(app, key),
                    TuiEvent::Paste(text) => {
                        app.insert_str(&text);
                        KeyOutcome::Edited
                    }
                    TuiEvent::Resize => KeyOutcome::Nothing,
                };
                match outcome {
                    KeyOutcome::Quit => break Ok(()),
                    KeyOutcome::Edited => submit(app, supervisor, store),
                    KeyOutcome::Save => save(app),
                    KeyOutcome::Nothing => {}
                }
            }
            Some(envelope) = events.recv() => {
                supervisor.deliver(envelope, app);
            }
            else => break Ok(()),
        }
    };

    stop.store(true, Ordering::Relaxed);
    result
}

/// Run the current buffer and remember it for the next session.
fn submit(app: &mut App, supervisor: &mut Supervisor, store: &SourceStore) {
    let revision = app.next_revision();
    supervisor.submit(&revision);
    if let Err(e) = store.save(&revision.text) {
        warn!("failed to store source: {:#}", e);
    }
}

fn save(app: &mut App) {
    let Some(path) = app.file.clone() else {
        app.status_message = "No file to save to; start with wren-live FILE".to_string();
        return;
    };
    match std::fs::write(&path, app.text()) {
        Ok(()) => {
            info!(path = %path.display(), "saved");
            app.mark_saved();
            app.status_message = format!("Saved {}", path.display());
        }
        Err(e) => {
            warn!(path = %path.display(), "save failed: {}", e);
            app.status_message = format!("Save failed: {}", e);
        }
    }
}

/// Handle keyboard events
fn handle_key_event(app: &mut App, key: KeyEvent) -> KeyOutcome {
    if app.show_help {
        app.show_help = false;
        return KeyOutcome::Nothing;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if !(ctrl && key.code == KeyCode::Char('c')) {
        app.last_ctrl_c_time = None;
        app.reset_status();
    }

    match key.code {
        KeyCode::Char('c') if ctrl => {
            if app.handle_ctrl_c() {
                return KeyOutcome::Quit;
            }
        }
        KeyCode::Char('q') if ctrl => return KeyOutcome::Quit,
        KeyCode::Char('s') if ctrl => return KeyOutcome::Save,
        KeyCode::Char('h') if ctrl => app.toggle_help(),
        KeyCode::F(1) => app.toggle_help(),
        KeyCode::Char(c) if !ctrl => {
            app.insert_char(c);
            return KeyOutcome::Edited;
        }
        KeyCode::Tab => {
            app.insert_tab();
            return KeyOutcome::Edited;
        }
        KeyCode::Enter => {
            app.insert_newline();
            return KeyOutcome::Edited;
        }
        KeyCode::Backspace => {
            if app.backspace() {
                return KeyOutcome::Edited;
            }
        }
        KeyCode::Delete => {
            if app.delete() {
                return KeyOutcome::Edited;
            }
        }
        KeyCode::Left => app.move_cursor_left(),
        KeyCode::Right => app.move_cursor_right(),
        KeyCode::Up => app.move_cursor_up(),
        KeyCode::Down => app.move_cursor_down(),
        KeyCode::Home => app.move_cursor_home(),
        KeyCode::End => app.move_cursor_end(),
        _ => {}
    }

    KeyOutcome::Nothing
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn typing_is_an_edit() {
        let mut app = App::new("", None);
        assert_eq!(handle_key_event(&mut app, key(KeyCode::Char('x'))), KeyOutcome::Edited);
        assert_eq!(handle_key_event(&mut app, key(KeyCode::Tab)), KeyOutcome::Edited);
        assert_eq!(app.text(), "x  ");
    }

    #[test]
    fn navigation_is_not_an_edit() {
        let mut app = App::new("ab", None);
        assert_eq!(handle_key_event(&mut app, key(KeyCode::Right)), KeyOutcome::Nothing);
        assert_eq!(handle_key_event(&mut app, key(KeyCode::Home)), KeyOutcome::Nothing);
        // nothing to delete before the first column
        assert_eq!(handle_key_event(&mut app, key(KeyCode::Backspace)), KeyOutcome::Nothing);
    }

    #[test]
    fn control_keys() {
        let mut app = App::new("", None);
        assert_eq!(handle_key_event(&mut app, ctrl('s')), KeyOutcome::Save);
        assert_eq!(handle_key_event(&mut app, ctrl('q')), KeyOutcome::Quit);
        assert_eq!(handle_key_event(&mut app, ctrl('c')), KeyOutcome::Nothing);
        assert_eq!(handle_key_event(&mut app, ctrl('c')), KeyOutcome::Quit);
    }

    #[test]
    fn help_swallows_next_key() {
        let mut app = App::new("", None);
        handle_key_event(&mut app, key(KeyCode::F(1)));
        assert!(app.show_help);
        assert_eq!(handle_key_event(&mut app, key(KeyCode::Char('x'))), KeyOutcome::Nothing);
        assert!(!app.show_help);
        assert_eq!(app.text(), "");
    }

    #[test]
    fn save_without_file_reports() {
        let mut app = App::new("x", None);
        save(&mut app);
        assert!(app.status_message.starts_with("No file"));
    }

    #[test]
    fn save_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.wren");
        let mut app = App::new("System.print(1)", Some(path.clone()));
        app.insert_char(' ');
        save(&mut app);
        assert!(!app.dirty);
        assert_eq!(std::fs::read_to_string(path).unwrap(), " System.print(1)");
    }

    #[test]
    fn initial_source_prefers_file_then_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SourceStore::new(dir.path().to_path_buf());
        assert_eq!(initial_source(None, &store).unwrap(), DEFAULT_SOURCE);

        store.save("var a = 1").unwrap();
        assert_eq!(initial_source(None, &store).unwrap(), "var a = 1");

        let file = dir.path().join("x.wren");
        std::fs::write(&file, "var b = 2").unwrap();
        assert_eq!(initial_source(Some(&file), &store).unwrap(), "var b = 2");
    }
}

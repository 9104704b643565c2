//! Terminal input events forwarded from the blocking reader thread.

use crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum TuiEvent {
    /// User keyboard input
    Key(KeyEvent),
    /// Bracketed paste content
    Paste(String),
    /// Terminal size changed; redraw
    Resize,
}

/// What a key press did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Nothing,
    /// Buffer changed; submit a new revision
    Edited,
    Save,
    Quit,
}

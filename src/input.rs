//! Key bindings (arrows and vim keys) and the terminal event source.

use crate::engine::Event;
use anyhow::Result;
use crossterm::event::{self, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// Map key event to game event. Supports both arrows and vim (hjkl).
pub fn key_to_event(key: KeyEvent) -> Event {
    let KeyEvent {
        code,
        modifiers,
        kind,
        ..
    } = key;
    if kind == KeyEventKind::Release {
        return Event::None;
    }
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Event::Quit;
    }
    if !(modifiers.is_empty() || modifiers == KeyModifiers::SHIFT) {
        return Event::None;
    }
    match code {
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Event::Quit,
        KeyCode::Char('p' | 'P') => Event::Pause,
        KeyCode::Left | KeyCode::Char('h') => Event::MoveLeft,
        KeyCode::Right | KeyCode::Char('l') => Event::MoveRight,
        KeyCode::Up | KeyCode::Char('k') => Event::RotateUp,
        KeyCode::Down | KeyCode::Char('j') => Event::SoftDrop,
        _ => Event::None,
    }
}

/// Next pending key, without waiting. Non-key terminal events map to `Event::None`.
pub fn poll_event() -> Result<Option<Event>> {
    if !event::poll(Duration::ZERO)? {
        return Ok(None);
    }
    Ok(Some(read_event()?))
}

/// Blocks until the next key arrives.
pub fn wait_event() -> Result<Event> {
    loop {
        match read_event()? {
            Event::None => continue,
            ev => return Ok(ev),
        }
    }
}

fn read_event() -> Result<Event> {
    Ok(match event::read()? {
        event::Event::Key(key) => key_to_event(key),
        _ => Event::None,
    })
}

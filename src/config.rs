use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub keybindings: Keybindings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keybindings {
    pub move_up: Vec<String>,
    pub move_down: Vec<String>,
    pub scan: Vec<String>,
    pub unsubscribe: Vec<String>,
    pub ignore_sender: Vec<String>,
    pub restore: Vec<String>,
    pub unignore: Vec<String>,
    pub next_view: Vec<String>,
    pub prev_view: Vec<String>,
    pub quit: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            keybindings: Keybindings {
                move_up: vec!["k".to_string(), "Up".to_string()],
                move_down: vec!["j".to_string(), "Down".to_string()],
                scan: vec!["s".to_string()],
                unsubscribe: vec!["u".to_string(), "Enter".to_string()],
                ignore_sender: vec!["i".to_string()],
                restore: vec!["r".to_string(), "Enter".to_string()],
                unignore: vec!["d".to_string(), "Enter".to_string()],
                next_view: vec!["Tab".to_string()],
                prev_view: vec!["BackTab".to_string()],
                quit: vec!["q".to_string()],
            },
        }
    }
}

/// Parses a binding like "ctrl-s" or "Down" into a key code plus modifiers.
pub fn parse_key_string(key_str: &str) -> (KeyCode, KeyModifiers) {
    let mut parts: Vec<&str> = key_str.split('-').collect();
    let mut modifiers = KeyModifiers::empty();

    let base_key_str = parts.pop().unwrap_or("");

    for part in parts {
        match part.to_lowercase().as_str() {
            "ctrl" => modifiers.insert(KeyModifiers::CONTROL),
            "alt" => modifiers.insert(KeyModifiers::ALT),
            "shift" => modifiers.insert(KeyModifiers::SHIFT),
            _ => {}
        }
    }

    let code = match base_key_str {
        "Enter" => KeyCode::Enter,
        "Left" => KeyCode::Left,
        "Right" => KeyCode::Right,
        "Up" => KeyCode::Up,
        "Down" => KeyCode::Down,
        "Tab" => KeyCode::Tab,
        "BackTab" => KeyCode::BackTab,
        "Esc" => KeyCode::Esc,
        " " => KeyCode::Char(' '),
        s if s.chars().count() == 1 => KeyCode::Char(s.chars().next().unwrap_or(' ')),
        _ => KeyCode::Null,
    };

    (code, modifiers)
}

pub fn matches_key(event: KeyEvent, bindings: &[String]) -> bool {
    bindings.iter().any(|b| {
        let (code, modifiers) = parse_key_string(b);
        event.code == code && event.modifiers.contains(modifiers)
    })
}

impl Config {
    pub fn load() -> Self {
        use std::fs;
        if let Ok(content) = fs::read_to_string("settings.toml") {
            if let Ok(config) = toml::from_str(&content) {
                return config;
            }
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_modified_keys() {
        assert_eq!(parse_key_string("s"), (KeyCode::Char('s'), KeyModifiers::empty()));
        assert_eq!(parse_key_string("Down"), (KeyCode::Down, KeyModifiers::empty()));
        assert_eq!(
            parse_key_string("ctrl-s"),
            (KeyCode::Char('s'), KeyModifiers::CONTROL)
        );
    }

    #[test]
    fn matches_any_binding_in_the_list() {
        let bindings = vec!["j".to_string(), "Down".to_string()];
        let down = KeyEvent::new(KeyCode::Down, KeyModifiers::empty());
        let j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::empty());
        let k = KeyEvent::new(KeyCode::Char('k'), KeyModifiers::empty());
        assert!(matches_key(down, &bindings));
        assert!(matches_key(j, &bindings));
        assert!(!matches_key(k, &bindings));
    }
}

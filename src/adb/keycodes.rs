//! Android key codes as data: a flat symbolic-name table, looked up at call
//! time. Covers the system, media, and alphanumeric buttons automation
//! flows actually press.

const KEYCODES: &[(&str, i32)] = &[
    // System buttons
    ("HOME", 3),
    ("BACK", 4),
    ("MENU", 82),
    ("SEARCH", 84),
    ("POWER", 26),
    ("ENTER", 66),
    // Media buttons
    ("VOLUME_UP", 24),
    ("VOLUME_DOWN", 25),
    ("MUTE", 91),
    ("NOTIFICATION", 83),
    ("PAGE_UP", 92),
    ("PAGE_DOWN", 93),
    // Alphanumeric
    ("A", 29),
    ("B", 30),
    ("C", 31),
    ("0", 7),
    ("1", 8),
    ("2", 9),
    ("3", 10),
    ("4", 11),
    ("5", 12),
    ("6", 13),
    ("7", 14),
    ("8", 15),
    ("9", 16),
];

/// Look up a key code by symbolic name, case-insensitive, with or without
/// the `KEYCODE_` prefix.
pub fn keycode(name: &str) -> Option<i32> {
    let upper = name.trim().to_uppercase();
    let stripped = upper.strip_prefix("KEYCODE_").unwrap_or(&upper);
    KEYCODES
        .iter()
        .find(|(symbol, _)| *symbol == stripped)
        .map(|(_, code)| *code)
}

pub fn all() -> impl Iterator<Item = (&'static str, i32)> {
    KEYCODES.iter().copied()
}

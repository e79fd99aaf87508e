//! Static formatting pools used by the entropy engine.
//!
//! These are the raw ingredients for structural variation: delimiters,
//! bullets, matched bracket pairs, header and index styles, and spacing
//! runs. Keeping them in one place means every formatting decision in a
//! render is drawn from a known, bounded set.

/// Section-level delimiters (full-width rules).
pub const SECTION_DELIMITERS: &[&str] = &[
    "───────────────────",
    "═══════════════════",
    "-------------------",
    "___________________",
    "~~~~~~~~~~~~~~~~~~~",
    "*******************",
    "###################",
    ":::::::::::::::::::",
    "+++++++++++++++++++",
    "▬▬▬▬▬▬▬▬▬▬▬▬▬▬▬▬▬▬▬",
];

/// Short subsection delimiters.
pub const SUBSECTION_DELIMITERS: &[&str] = &[
    "---", "···", "~~~", "***", "+++", "###", ":::", "▸▸▸", "◦◦◦", "●●●",
];

/// Bullet characters for list items.
pub const BULLETS: &[&str] = &[
    "•", "○", "●", "◦", "▪", "▫", "►", "▸", "→", "⇒", "★", "◆", "-", "*",
];

/// Opening brackets. Paired with [`BRACKET_CLOSE`] by index, so a draw at
/// index `i` always yields a matching pair.
pub const BRACKET_OPEN: &[&str] = &[
    "[", "(", "{", "⟨", "⟪", "【", "「", "『", "〈", "《",
];

/// Closing brackets, index-aligned with [`BRACKET_OPEN`].
pub const BRACKET_CLOSE: &[&str] = &[
    "]", ")", "}", "⟩", "⟫", "】", "」", "』", "〉", "》",
];

/// Header styles as (prefix, suffix) pairs wrapped around the name.
pub const HEADER_FORMATS: &[(&str, &str)] = &[
    ("[", "]"),
    ("【", "】"),
    ("《", "》"),
    ("⟨", "⟩"),
    ("── ", " ──"),
    ("═══ ", " ═══"),
    ("*** ", " ***"),
    ("### ", " ###"),
    ("::: ", " :::"),
    (">>> ", " <<<"),
    ("--- ", " ---"),
    ("| ", " |"),
];

/// Spacing runs usable in any context.
pub const SPACING_NORMAL: &[&str] = &["", " ", "  ", "\t", "\n", "\n\n", " \n"];

/// Spacing runs for tight contexts (inline separators).
pub const SPACING_TIGHT: &[&str] = &["", " "];

/// Spacing runs for loose contexts (between blocks).
pub const SPACING_LOOSE: &[&str] = &["\n", "\n\n", " \n"];

/// Character sets for noise/tag generation.
pub const CHARSET_ALPHA: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const CHARSET_NUMERIC: &str = "0123456789";
pub const CHARSET_ALPHANUMERIC: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
pub const CHARSET_MIXED: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-.";
pub const CHARSET_SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?";

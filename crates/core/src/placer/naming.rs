//! Library naming: `Title (Year)/Title (Year).mkv`.

use std::path::{Path, PathBuf};

/// Container extension of everything placed in the library.
pub const LIBRARY_EXTENSION: &str = "mkv";

fn is_forbidden(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || (c as u32) < 0x20
}

/// Strip characters that are illegal on common filesystems.
///
/// Whitespace runs collapse to one space and leading/trailing spaces and
/// dots are removed.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name.chars().filter(|c| !is_forbidden(*c)).collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c| c == ' ' || c == '.')
        .to_string()
}

/// Folder and file stem for a title: `Title (Year)` or just `Title`.
///
/// Returns `None` when the title sanitizes to nothing.
pub fn library_name(title: &str, year: Option<i32>) -> Option<String> {
    let title = sanitize_filename(title);
    if title.is_empty() {
        return None;
    }
    Some(match year {
        Some(y) => format!("{} ({})", title, y),
        None => title,
    })
}

/// Full destination path under `root`.
pub fn library_destination(root: &Path, title: &str, year: Option<i32>) -> Option<PathBuf> {
    let name = library_name(title, year)?;
    Some(
        root.join(&name)
            .join(format!("{}.{}", name, LIBRARY_EXTENSION)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename(r#"Movie: The "Sequel""#), "Movie The Sequel");
        assert_eq!(sanitize_filename("What/If?"), "WhatIf");
        assert_eq!(sanitize_filename("  ...Dots and  spaces.. "), "Dots and spaces");
        assert_eq!(sanitize_filename("Tab\there"), "Tabhere");
        assert_eq!(sanitize_filename(""), "");
    }

    #[test]
    fn test_library_name() {
        assert_eq!(
            library_name("The Matrix", Some(1999)).as_deref(),
            Some("The Matrix (1999)")
        );
        assert_eq!(library_name("Home Video", None).as_deref(), Some("Home Video"));
        assert!(library_name("???", Some(2000)).is_none());
    }

    #[test]
    fn test_library_destination() {
        let dest = library_destination(Path::new("/media/Movies"), "The Matrix", Some(1999));
        assert_eq!(
            dest,
            Some(PathBuf::from(
                "/media/Movies/The Matrix (1999)/The Matrix (1999).mkv"
            ))
        );
    }
}

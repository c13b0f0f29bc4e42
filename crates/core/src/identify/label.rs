use once_cell::sync::Lazy;
use regex_lite::Regex;

/// Noise found in disc labels, applied in order.
const LABEL_NOISE: &[&str] = &[
    // disc numbering
    r"_*DISC_*\d+",
    r"_*DISC\d+",
    r"^DVD_",
    r"_DVD$",
    r"_DVD_",
    // framing
    r"_*WIDESCREEN",
    r"(?:^|_)WS(?:_|$)",
    r"_*FULLSCREEN",
    r"(?:^|_|\s)FS(?:_|$|\s)",
    // editions
    r"_*SPECIAL_*EDITION",
    r"(?:^|_)SE(?:_|$)",
    r"_*DIRECTORS_*CUT",
    r"(?:^|_)DC(?:_|$)",
    r"_*UNRATED",
    r"_*EXTENDED",
    r"_*THEATRICAL",
    r"_*COLLECTORS_*EDITION",
    r"(?:^|_)CE(?:_|$)",
    r"_*PLATINUM_*EDITION",
    r"_*ANNIVERSARY_*EDITION",
    r"_*\d+TH_*ANNIVERSARY",
    // formats
    r"_*BLURAY",
    r"_*BLU_*RAY",
    r"(?:^|_)HD(?:_|$)",
    r"(?:^|_)4K(?:_|$)",
    r"_*D\d+$",
    // regions
    r"_R\d+$",
    r"_REGION_*\d+",
    // aspect ratio
    r"_*16X9",
    r"_*4X3",
    r"_*ANAMORPHIC",
    // distribution markers
    r"_*US_*DES",
    r"_*UK_*DES",
    r"(?:^|_)PS(?:_|$)",
    r"(?:^|_)DES(?:_|$)",
    r"_*NTSC",
    r"_*PAL",
    // versions
    r"_*V\d+$",
    r"_*VERSION_*\d+",
    r"_*DELUXE",
    r"_*ULTIMATE",
    r"_*REMASTERED",
    r"_*RESTORED",
    // trailing studio codes such as _A1
    r"_+[A-Z]\d*$",
];

static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    LABEL_NOISE
        .iter()
        .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
        .collect()
});

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn a raw disc label into a lowercase search query.
///
/// Never returns an empty string for a non-blank label: when every token is
/// noise the lowercased raw label is used instead.
pub fn clean_disc_label(label: &str) -> String {
    let mut cleaned = label.to_string();
    for re in NOISE_PATTERNS.iter() {
        cleaned = re.replace_all(&cleaned, " ").into_owned();
    }

    let cleaned = collapse_whitespace(&cleaned.replace('_', " ")).to_lowercase();
    if cleaned.is_empty() {
        collapse_whitespace(&label.replace('_', " ")).to_lowercase()
    } else {
        cleaned
    }
}

/// A cleaned query split into title words and an optional release year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub title: String,
    pub year: Option<i32>,
}

/// Split a trailing `19xx`/`20xx` token off a cleaned query.
///
/// The year is kept in the title when it is the only word, so a disc called
/// `1917` still searches for "1917".
pub fn split_year(cleaned: &str) -> SearchQuery {
    let unsplit = || SearchQuery {
        title: cleaned.to_string(),
        year: None,
    };

    let Some((head, last)) = cleaned.rsplit_once(' ') else {
        return unsplit();
    };

    let is_year = last.len() == 4
        && last.chars().all(|c| c.is_ascii_digit())
        && (last.starts_with("19") || last.starts_with("20"));
    if !is_year || head.trim().is_empty() {
        return unsplit();
    }

    SearchQuery {
        title: head.trim().to_string(),
        year: last.parse().ok(),
    }
}

/// Human-friendly title for discs that are never searched.
///
/// `FAMILY_TRIP_2019` becomes `Family Trip 2019`.
pub fn prettify_label(label: &str) -> String {
    collapse_whitespace(&label.replace('_', " "))
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

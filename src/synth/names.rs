//! Human-name parsing into given and family names

const TITLES: &[&str] = &["dr", "prof", "mr", "mrs", "ms", "mx", "sir", "dame"];

const SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv", "phd", "md", "esq"];

/// Lower-case particles that belong to the family name ("van Rossum", "de la Cruz")
const PARTICLES: &[&str] = &[
    "van", "von", "de", "der", "den", "da", "di", "del", "della", "dos", "du", "la", "le", "ter",
];

/// A parsed person name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub given: String,
    pub family: Option<String>,
}

fn normalized(token: &str) -> String {
    token.trim_matches(|c: char| c == '.' || c == ',').to_lowercase()
}

fn is_title(token: &str) -> bool {
    TITLES.contains(&normalized(token).as_str())
}

fn is_suffix(token: &str) -> bool {
    SUFFIXES.contains(&normalized(token).as_str())
}

fn is_particle(token: &str) -> bool {
    PARTICLES.contains(&token)
}

/// Parse a free-form display name
///
/// Accepts "Given Family", "Family, Given", leading titles and trailing suffixes.
/// Returns `None` for blank input.
pub fn parse_name(raw: &str) -> Option<ParsedName> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let segments: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    // "Family, Given" unless the part after the comma is only a suffix ("Ann Lee, PhD")
    if segments.len() >= 2 && !segments[1].split_whitespace().all(is_suffix) {
        let family = strip_affixes(segments[0]);
        let given = strip_affixes(segments[1]);
        if !family.is_empty() && !given.is_empty() {
            return Some(ParsedName {
                given: given.join(" "),
                family: Some(family.join(" ")),
            });
        }
    }

    let tokens = strip_affixes(segments.first().copied().unwrap_or(raw));
    match tokens.len() {
        0 => None,
        1 => Some(ParsedName {
            given: tokens[0].to_string(),
            family: None,
        }),
        len => {
            let mut family_start = len - 1;
            while family_start > 1 && is_particle(tokens[family_start - 1]) {
                family_start -= 1;
            }

            Some(ParsedName {
                given: tokens[..family_start].join(" "),
                family: Some(tokens[family_start..].join(" ")),
            })
        }
    }
}

fn strip_affixes(segment: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = segment.split_whitespace().collect();

    while tokens.len() > 1 && is_title(tokens[0]) {
        tokens.remove(0);
    }
    while tokens.len() > 1 && tokens.last().is_some_and(|t| is_suffix(t)) {
        tokens.pop();
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(given: &str, family: Option<&str>) -> Option<ParsedName> {
        Some(ParsedName {
            given: given.to_string(),
            family: family.map(str::to_string),
        })
    }

    #[test]
    fn test_given_family() {
        assert_eq!(parse_name("Ada Lovelace"), parsed("Ada", Some("Lovelace")));
        assert_eq!(
            parse_name("Grace Brewster Hopper"),
            parsed("Grace Brewster", Some("Hopper"))
        );
    }

    #[test]
    fn test_family_comma_given() {
        assert_eq!(parse_name("Lovelace, Ada"), parsed("Ada", Some("Lovelace")));
        assert_eq!(
            parse_name("van Rossum, Guido"),
            parsed("Guido", Some("van Rossum"))
        );
    }

    #[test]
    fn test_particles_titles_and_suffixes() {
        assert_eq!(
            parse_name("Guido van Rossum"),
            parsed("Guido", Some("van Rossum"))
        );
        assert_eq!(
            parse_name("Dr. Juan de la Cruz"),
            parsed("Juan", Some("de la Cruz"))
        );
        assert_eq!(
            parse_name("Martin Luther King Jr."),
            parsed("Martin Luther", Some("King"))
        );
        assert_eq!(parse_name("Ann Lee, PhD"), parsed("Ann", Some("Lee")));
    }

    #[test]
    fn test_single_and_blank() {
        assert_eq!(parse_name("octocat"), parsed("octocat", None));
        assert_eq!(parse_name("   "), None);
    }
}

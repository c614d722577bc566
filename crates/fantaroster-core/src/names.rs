// Name normalization for matching players across datasets.

use unicode_normalization::UnicodeNormalization;

/// Fold a free-text name for comparison: trim, decompose (NFD), drop the
/// combining diacritical marks block, lowercase.
///
/// `"  Nicolò Barella "` folds to `"nicolo barella"`.
pub fn fold(text: &str) -> String {
    text.trim()
        .nfd()
        .filter(|c| !is_combining_diacritic(*c))
        .collect::<String>()
        .to_lowercase()
}

fn is_combining_diacritic(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// Comparable surname / given-name pair derived from a full name.
///
/// The surname is the last whitespace-delimited token of the folded name and
/// the given name is the first, so a single-token name uses the same token
/// for both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameKey {
    pub surname: String,
    pub given: String,
}

impl NameKey {
    /// Returns `None` when the name has no tokens at all.
    pub fn parse(full_name: &str) -> Option<Self> {
        let folded = fold(full_name);
        let mut tokens = folded.split_whitespace();
        let given = tokens.next()?.to_string();
        let surname = tokens.last().map(str::to_string).unwrap_or_else(|| given.clone());
        Some(Self { surname, given })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_strips_accents_and_case() {
        assert_eq!(fold("  Nicolò Barella "), "nicolo barella");
        assert_eq!(fold("KVARATSKHELIA"), "kvaratskhelia");
        assert_eq!(fold("Çalhanoğlu"), "calhanoglu");
        assert_eq!(fold("Gaëtan Laborde"), "gaetan laborde");
    }

    #[test]
    fn fold_keeps_letters_outside_combining_block() {
        // ø and ł have no decomposition, so they survive folding.
        assert_eq!(fold("Højlund"), "højlund");
        assert_eq!(fold("Zieliński"), "zielinski");
    }

    #[test]
    fn name_key_first_and_last_tokens() {
        let key = NameKey::parse("Lautaro Javier Martínez").unwrap();
        assert_eq!(key.given, "lautaro");
        assert_eq!(key.surname, "martinez");
    }

    #[test]
    fn name_key_collapses_extra_whitespace() {
        let key = NameKey::parse("  Paolo    Rossi  ").unwrap();
        assert_eq!(key.given, "paolo");
        assert_eq!(key.surname, "rossi");
    }

    #[test]
    fn single_token_name() {
        let key = NameKey::parse("Dybala").unwrap();
        assert_eq!(key.given, "dybala");
        assert_eq!(key.surname, "dybala");
    }

    #[test]
    fn blank_name_has_no_key() {
        assert!(NameKey::parse("").is_none());
        assert!(NameKey::parse("   ").is_none());
    }
}

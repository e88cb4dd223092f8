//! Genre inference from an analysis's free-text suggestion.

use crate::scene::Genre;

/// Maps a free-text genre suggestion onto the genre vocabulary.
pub trait GenreClassifier: Send + Sync {
    /// `None` when nothing in the suggestion is recognised.
    fn classify(&self, suggestion: &str) -> Option<Genre>;
}

/// Substring matching over English and Chinese genre keywords.
///
/// Rules are checked in order; the first hit wins.
#[derive(Debug, Clone)]
pub struct KeywordGenreClassifier {
    rules: Vec<(Genre, Vec<String>)>,
}

impl KeywordGenreClassifier {
    pub fn new(rules: Vec<(Genre, Vec<String>)>) -> Self {
        Self { rules }
    }
}

impl Default for KeywordGenreClassifier {
    fn default() -> Self {
        let rule = |genre, words: &[&str]| (genre, words.iter().map(|w| w.to_string()).collect());
        Self::new(vec![
            rule(Genre::Scifi, &["scifi", "sci-fi", "science fiction", "科幻"]),
            rule(Genre::Fantasy, &["fantasy", "奇幻"]),
            rule(Genre::Mystery, &["mystery", "悬疑"]),
            rule(Genre::Romance, &["romance", "爱情"]),
            rule(Genre::Horror, &["horror", "恐怖"]),
            rule(Genre::Comedy, &["comedy", "喜剧"]),
            rule(Genre::Drama, &["drama", "戏剧"]),
            rule(Genre::Adventure, &["adventure", "冒险"]),
        ])
    }
}

impl GenreClassifier for KeywordGenreClassifier {
    fn classify(&self, suggestion: &str) -> Option<Genre> {
        let suggestion = suggestion.to_lowercase();
        self.rules
            .iter()
            .find(|(_, words)| words.iter().any(|w| suggestion.contains(w.as_str())))
            .map(|(genre, _)| *genre)
    }
}

/// Pick the story genre: an explicit request wins, then the classifier's
/// reading of the suggestion, then `fallback`.
pub fn choose_genre(
    explicit: Option<Genre>,
    suggestion: &str,
    classifier: &dyn GenreClassifier,
    fallback: Genre,
) -> Genre {
    explicit
        .or_else(|| classifier.classify(suggestion))
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_classification() {
        let classifier = KeywordGenreClassifier::default();
        assert_eq!(classifier.classify("A dark Sci-Fi thriller"), Some(Genre::Scifi));
        assert_eq!(classifier.classify("奇幻冒险"), Some(Genre::Fantasy));
        assert_eq!(classifier.classify("Romantic comedy"), Some(Genre::Comedy));
        assert_eq!(classifier.classify("slice of life"), None);
    }

    #[test]
    fn test_choose_genre_precedence() {
        let classifier = KeywordGenreClassifier::default();
        assert_eq!(
            choose_genre(Some(Genre::Drama), "horror", &classifier, Genre::Adventure),
            Genre::Drama
        );
        assert_eq!(
            choose_genre(None, "gothic horror", &classifier, Genre::Adventure),
            Genre::Horror
        );
        assert_eq!(
            choose_genre(None, "slice of life", &classifier, Genre::Mystery),
            Genre::Mystery
        );
    }
}

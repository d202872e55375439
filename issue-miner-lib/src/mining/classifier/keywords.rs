//! Glossary keyword matching on issue titles.

use crate::Result;
use ohno::IntoAppError;
use std::path::Path;

const LOG_TARGET: &str = "  glossary";

/// Characters that separate words in a title.
const SEPARATORS: &[char] = &['.', ',', '>', '<', '='];

/// Characters removed from a title without separating words.
const STRIPPED: &[char] = &['"', '\'', '`', '[', ']', '(', ')'];

/// Lower-case `title` and split it into word tokens.
#[must_use]
pub fn normalize_title(title: &str) -> Vec<String> {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .map(|c| if SEPARATORS.contains(&c) { ' ' } else { c })
        .collect();

    cleaned.split_whitespace().map(str::to_string).collect()
}

/// A deduplicated list of ML terms, each stored as its normalized tokens.
#[derive(Debug, Clone, Default)]
pub struct Glossary {
    keywords: Vec<Vec<String>>,
}

impl Glossary {
    /// Build a glossary from raw keywords, normalizing and deduplicating them.
    pub fn from_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<Vec<String>> = Vec::new();
        for keyword in keywords {
            let tokens = normalize_title(keyword.as_ref());
            if !tokens.is_empty() && !normalized.contains(&tokens) {
                normalized.push(tokens);
            }
        }

        Self { keywords: normalized }
    }

    /// Load a keyword list.
    ///
    /// A `.csv` file is read through its `column` header; lacking that, the
    /// second column, then the first. Any other file holds one keyword per line.
    /// Text that is not UTF-8 is read as Latin-1.
    pub fn load(path: &Path, column: &str) -> Result<Self> {
        let bytes = std::fs::read(path).into_app_err_with(|| format!("reading glossary '{}'", path.display()))?;
        let text = decode(bytes);

        let is_csv = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        let glossary = if is_csv {
            Self::from_keywords(csv_column(&text, column).into_app_err_with(|| format!("parsing glossary '{}'", path.display()))?)
        } else {
            Self::from_keywords(text.lines())
        };

        log::info!(target: LOG_TARGET, "Loaded {} keyword(s) from '{}'", glossary.len(), path.display());
        Ok(glossary)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.keywords.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// The first keyword found in `title`, as a space-joined phrase.
    ///
    /// A single-word keyword must equal a title token. A multi-word keyword must
    /// appear as a contiguous run of title tokens.
    #[must_use]
    pub fn find_in(&self, title: &str) -> Option<String> {
        let tokens = normalize_title(title);
        self.keywords
            .iter()
            .find(|keyword| tokens.windows(keyword.len()).any(|window| window == keyword.as_slice()))
            .map(|keyword| keyword.join(" "))
    }
}

fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

fn csv_column(text: &str, column: &str) -> core::result::Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();

    let index = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(column))
        .unwrap_or_else(|| usize::from(headers.len() > 1));

    let mut values = Vec::new();
    for record in reader.records() {
        if let Some(value) = record?.get(index) {
            values.push(value.to_string());
        }
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title(r#"Fix "Gradient" (NaN) in loss.backward() when lr>=0.1, [urgent]"#),
            vec!["fix", "gradient", "nan", "in", "loss", "backward", "when", "lr", "0", "1", "urgent"]
        );
    }

    #[test]
    fn test_exact_token_match() {
        let glossary = Glossary::from_keywords(["gradient", "epoch"]);
        assert_eq!(glossary.find_in("Exploding gradient after warmup"), Some("gradient".to_string()));
        assert_eq!(glossary.find_in("Gradients explode"), None);
        assert_eq!(glossary.find_in("Epoch-based scheduling"), None);
    }

    #[test]
    fn test_multi_word_keyword_needs_contiguous_tokens() {
        let glossary = Glossary::from_keywords(["learning rate"]);
        assert_eq!(glossary.find_in("Learning rate is ignored"), Some("learning rate".to_string()));
        assert_eq!(glossary.find_in("rate of learning"), None);
        assert_eq!(glossary.find_in("learning the rate"), None);
    }

    #[test]
    fn test_keywords_are_normalized_and_deduplicated() {
        let glossary = Glossary::from_keywords(["Gradient", "gradient ", "", "  ", "(Epoch)"]);
        assert_eq!(glossary.len(), 2);
        assert_eq!(glossary.find_in("one epoch"), Some("epoch".to_string()));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri does not support file system access")]
    fn test_load_csv_by_column_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Keyword_list.csv");
        std::fs::write(&path, "id,keyword\n1,Gradient\n2,learning rate\n3,gradient\n").unwrap();

        let glossary = Glossary::load(&path, "keyword").unwrap();
        assert_eq!(glossary.len(), 2);
        assert!(glossary.find_in("bad learning rate").is_some());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri does not support file system access")]
    fn test_load_csv_falls_back_to_second_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terms.csv");
        std::fs::write(&path, "n,term\n1,epoch\n").unwrap();

        let glossary = Glossary::load(&path, "keyword").unwrap();
        assert_eq!(glossary.find_in("one epoch"), Some("epoch".to_string()));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri does not support file system access")]
    fn test_load_plain_latin1_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.txt");
        std::fs::write(&path, b"gradient\nna\xefve bayes\n").unwrap();

        let glossary = Glossary::load(&path, "keyword").unwrap();
        assert_eq!(glossary.len(), 2);
        assert_eq!(glossary.find_in("Na\u{ef}ve Bayes baseline"), Some("na\u{ef}ve bayes".to_string()));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let _ = Glossary::load(Path::new("/nonexistent/keywords.csv"), "keyword").unwrap_err();
    }
}

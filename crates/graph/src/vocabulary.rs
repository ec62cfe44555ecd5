//! Promise vocabularies and validation of the promises a catalog uses.

use crate::distance::{closest, SUGGESTION_COUNT};
use crate::error::{GraphError, PromiseSuggestion, Result};
use std::collections::BTreeSet;
use std::io::BufRead;
use std::path::Path;

/// Set of accepted promise labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    promises: BTreeSet<String>,
}

impl Vocabulary {
    /// Parse a line-oriented vocabulary: first comma-separated field per line.
    ///
    /// Everything after `#` is a comment; blank lines are skipped.
    pub fn parse(text: &str) -> Self {
        text.lines().filter_map(first_field).collect()
    }

    pub fn from_reader<R: BufRead>(reader: R, path: &Path) -> Result<Self> {
        let mut promises = BTreeSet::new();
        for line in reader.lines() {
            let line = line.map_err(|source| GraphError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            if let Some(promise) = first_field(&line) {
                promises.insert(promise);
            }
        }
        Ok(Self { promises })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let vocabulary = Self::from_reader(std::io::BufReader::new(file), path)?;
        log::debug!(
            "Read {} promises from {}",
            vocabulary.len(),
            path.display()
        );
        Ok(vocabulary)
    }

    pub fn contains(&self, promise: &str) -> bool {
        self.promises.contains(promise)
    }

    pub fn union(&self, other: &Vocabulary) -> Vocabulary {
        self.promises.union(&other.promises).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.promises.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.promises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.promises.is_empty()
    }

    /// Promises in `used` that this vocabulary does not declare.
    pub fn unknown<'a, I>(&self, used: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        used.into_iter()
            .filter(|promise| !self.contains(promise))
            .cloned()
            .collect()
    }

    /// Closest vocabulary entries for each unknown promise.
    pub fn suggest(&self, unknown: &BTreeSet<String>) -> Vec<PromiseSuggestion> {
        unknown
            .iter()
            .map(|promise| PromiseSuggestion {
                promise: promise.clone(),
                candidates: closest(promise, self.iter(), SUGGESTION_COUNT)
                    .into_iter()
                    .map(|(_, candidate)| candidate.to_string())
                    .collect(),
            })
            .collect()
    }

    /// Fail with suggestions if any of `used` is outside the vocabulary.
    pub fn validate<'a, I>(&self, used: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let unknown = self.unknown(used);
        if unknown.is_empty() {
            return Ok(());
        }
        Err(GraphError::UnknownPromises(self.suggest(&unknown)))
    }
}

impl FromIterator<String> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            promises: iter.into_iter().collect(),
        }
    }
}

fn first_field(line: &str) -> Option<String> {
    let content = line.split('#').next().unwrap_or_default().trim();
    if content.is_empty() {
        return None;
    }
    let field = content
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"');
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_promise_descriptions() {
        let content = "promise1, Description 1
promise2, Description 2
#promise3, Description 3
# promise4, Description 4
 # promise5, Description 5";

        let promises = Vocabulary::parse(content);
        assert_eq!(promises.len(), 2);
        assert!(promises.contains("promise1"));
        assert!(promises.contains("promise2"));
    }

    #[test]
    fn strips_trailing_comments_and_blank_lines() {
        let promises = Vocabulary::parse("\n\ncode_executed # granted by execution\n\n");
        assert_eq!(promises.iter().collect::<Vec<_>>(), vec!["code_executed"]);
    }

    #[test]
    fn from_reader_matches_parse() {
        let content = "a, first\n# b\nc\n";
        let parsed = Vocabulary::parse(content);
        let read = Vocabulary::from_reader(content.as_bytes(), Path::new("inline")).unwrap();
        assert_eq!(parsed, read);
    }

    #[test]
    fn validate_reports_unknown_with_suggestions() {
        let vocabulary = Vocabulary::parse("code_executed\npersistence\nfile_transfer\n");
        let used = vec!["code_execute".to_string(), "persistence".to_string()];

        let err = vocabulary.validate(&used).unwrap_err();
        match err {
            GraphError::UnknownPromises(suggestions) => {
                assert_eq!(suggestions.len(), 1);
                assert_eq!(suggestions[0].promise, "code_execute");
                assert_eq!(suggestions[0].candidates[0], "code_executed");
                assert_eq!(suggestions[0].candidates.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn union_contains_both() {
        let general = Vocabulary::parse("a\n");
        let system = Vocabulary::parse("b\n");
        let both = general.union(&system);
        assert!(both.contains("a"));
        assert!(both.contains("b"));
        assert!(general.validate(&["b".to_string()]).is_err());
        assert!(both.validate(&["b".to_string()]).is_ok());
    }
}

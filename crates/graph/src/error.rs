use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Promises in techniques not specified in promise vocabulary:\n{}", SuggestionList(.0))]
    UnknownPromises(Vec<PromiseSuggestion>),

    #[error("{} technique field(s) missing: {}", .0.len(), MissingList(.0))]
    MissingFields(Vec<MissingField>),

    #[error("Technique not found: {0}")]
    UnknownTechnique(String),
}

/// A required field absent from a raw technique record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MissingField {
    pub technique: String,
    pub field: &'static str,
}

/// An unrecognized promise with its closest vocabulary entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromiseSuggestion {
    pub promise: String,
    pub candidates: Vec<String>,
}

struct SuggestionList<'a>(&'a [PromiseSuggestion]);

impl fmt::Display for SuggestionList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, suggestion) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "  {} (perhaps you meant: {})",
                suggestion.promise,
                suggestion.candidates.join(", ")
            )?;
        }
        Ok(())
    }
}

struct MissingList<'a>(&'a [MissingField]);

impl fmt::Display for MissingList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|m| format!("{}.{}", m.technique, m.field))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

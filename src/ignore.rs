// src/ignore.rs

//! Ignore list for dependency relations
//!
//! Administrators can suppress specific ordering relations with a
//! configured list of `requirer>provider` name pairs (shell-style
//! tokenization, so quoted pairs are allowed). A relation whose endpoint
//! names match a pair is simply never recorded. Malformed configuration
//! text degrades to an empty list with a logged notice rather than an
//! error.

use std::path::Path;
use tracing::{debug, warn};

/// One suppressed relation: the requiring package's name and the
/// providing package's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnorePair {
    pub requirer: String,
    pub provider: String,
}

/// Configured set of dependency relations to skip when building the
/// relation graph. Immutable once parsed.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    pairs: Vec<IgnorePair>,
}

impl IgnoreList {
    /// Create an empty ignore list
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse configuration text into an ignore list.
    ///
    /// The text is tokenized shell-style (whitespace separated, single
    /// and double quotes and backslash escapes honored). Each token is a
    /// `requirer>provider` pair; tokens without a `>` are logged and
    /// skipped. Tokenization failures degrade to an empty list.
    ///
    /// `loud` raises per-pair logging from debug to warn, for callers
    /// that want loop-related configuration to be user-visible.
    pub fn parse(text: &str, loud: bool) -> Self {
        let tokens = match tokenize(text) {
            Ok(tokens) => tokens,
            Err(err) => {
                warn!("malformed dependency ignore list ({}), ignoring it", err);
                return Self::empty();
            }
        };

        let mut pairs = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            match token.split_once('>') {
                Some((requirer, provider)) if !requirer.is_empty() && !provider.is_empty() => {
                    if loud {
                        warn!(
                            "ignore package name relation(s) [{}]\t{} -> {}",
                            i, requirer, provider
                        );
                    } else {
                        debug!(
                            "ignore package name relation(s) [{}]\t{} -> {}",
                            i, requirer, provider
                        );
                    }
                    pairs.push(IgnorePair {
                        requirer: requirer.to_string(),
                        provider: provider.to_string(),
                    });
                }
                _ => {
                    if loud {
                        warn!("ignore package name relation(s) [{}]\t{} -> ???", i, token);
                    } else {
                        debug!("ignore package name relation(s) [{}]\t{} -> ???", i, token);
                    }
                }
            }
        }

        Self { pairs }
    }

    /// Read and parse an ignore list from a configuration file. Missing
    /// or unreadable files degrade to an empty list.
    pub fn from_file(path: &Path, loud: bool) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, loud),
            Err(err) => {
                warn!(
                    "cannot read dependency ignore list {}: {}",
                    path.display(),
                    err
                );
                Self::empty()
            }
        }
    }

    /// Whether the relation `requirer -> provider` is configured to be
    /// skipped.
    pub fn is_ignored(&self, requirer: &str, provider: &str) -> bool {
        self.pairs
            .iter()
            .any(|p| p.requirer == requirer && p.provider == provider)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }
}

/// Shell-style tokenizer: whitespace separates tokens, quotes group, a
/// backslash escapes the next character outside single quotes.
fn tokenize(text: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err("unterminated single quote".to_string()),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c) => current.push(c),
                            None => return Err("trailing backslash".to_string()),
                        },
                        Some(c) => current.push(c),
                        None => return Err("unterminated double quote".to_string()),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(c) => current.push(c),
                    None => return Err("trailing backslash".to_string()),
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

//! Fatal error classification.
//!
//! Some failures can't be fixed by trying again: a banned account stays
//! banned, a wrong password stays wrong. The classifier decides which
//! error texts mean "stop retrying".

use serde::{Deserialize, Serialize};

/// Matchers used when nothing else is configured.
pub const DEFAULT_FATAL_MATCHERS: &[&str] = &[
    "invalid username",
    "invalid credentials",
    "authentication failed",
    "banned",
    "whitelist",
];

/// Case-insensitive substring matcher over error and kick texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct FatalErrorClassifier {
    /// Stored lowercased; empty strings are dropped since they'd match
    /// everything.
    matchers: Vec<String>,
}

impl FatalErrorClassifier {
    pub fn new<I, T>(matchers: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            matchers: matchers
                .into_iter()
                .map(|m| m.into().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Adds one more matcher.
    pub fn with_matcher(mut self, matcher: impl Into<String>) -> Self {
        let matcher = matcher.into().trim().to_lowercase();
        if !matcher.is_empty() && !self.matchers.contains(&matcher) {
            self.matchers.push(matcher);
        }
        self
    }

    /// The first matcher found in `message`, if any.
    pub fn matched(&self, message: &str) -> Option<&str> {
        let message = message.to_lowercase();
        self.matchers
            .iter()
            .find(|m| message.contains(m.as_str()))
            .map(String::as_str)
    }

    /// Returns `true` if retrying after `message` is pointless.
    pub fn is_fatal(&self, message: &str) -> bool {
        self.matched(message).is_some()
    }

    pub fn matchers(&self) -> &[String] {
        &self.matchers
    }
}

impl Default for FatalErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_FATAL_MATCHERS.iter().copied())
    }
}

impl From<Vec<String>> for FatalErrorClassifier {
    fn from(matchers: Vec<String>) -> Self {
        Self::new(matchers)
    }
}

impl From<FatalErrorClassifier> for Vec<String> {
    fn from(classifier: FatalErrorClassifier) -> Self {
        classifier.matchers
    }
}

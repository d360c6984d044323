// Supported editor languages and their starter templates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of languages a session buffer can hold.
///
/// Adding a language means adding a variant, its wire name, and a default
/// template below — nothing else in the workspace needs to change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Javascript,
    Python,
}

/// Every supported language, in wire-name order.
pub const ALL_LANGUAGES: &[Language] = &[Language::Javascript, Language::Python];

const JAVASCRIPT_TEMPLATE: &str = r#"// Write your JavaScript code here

function solution() {
  // Your code here
  console.log("Hello, World!");
}

solution();"#;

const PYTHON_TEMPLATE: &str = r#"# Write your Python code here

def solution():
    # Your code here
    print("Hello, World!")

solution()"#;

impl Language {
    /// Wire name, e.g. `"javascript"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Javascript => "javascript",
            Self::Python => "python",
        }
    }

    /// Starter code placed in the buffer at session creation and on
    /// every language change.
    pub const fn default_template(self) -> &'static str {
        match self {
            Self::Javascript => JAVASCRIPT_TEMPLATE,
            Self::Python => PYTHON_TEMPLATE,
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::Javascript
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a request names a language outside the supported set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language `{0}`")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_LANGUAGES
            .iter()
            .copied()
            .find(|language| language.as_str() == s)
            .ok_or_else(|| UnknownLanguage(s.to_string()))
    }
}

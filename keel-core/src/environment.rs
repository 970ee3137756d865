use std::fmt;

/// Runtime environment, controlling how much diagnostic detail error
/// envelopes carry.
///
/// Only the exact name `"development"` selects [`Environment::Development`];
/// every other name, including an empty one, is production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// Resolve an environment from its configured name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name == "development" {
            Self::Development
        } else {
            Self::Production
        }
    }

    #[must_use]
    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

//! Name-based ignore rules.
//!
//! Each configured entry is either an exact process name or a regular
//! expression searched within the name. Entries may carry an explicit
//! `match:` or `regex:` prefix; unprefixed entries follow the configured
//! default mode.

use crate::error::{DiscoveryError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MATCH_PREFIX: &str = "match:";
pub const REGEX_PREFIX: &str = "regex:";

/// How unprefixed ignore entries are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreMode {
    /// Exact string equality.
    #[default]
    Match,
    /// Unanchored regular-expression search.
    Regex,
}

impl FromStr for IgnoreMode {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "match" => Ok(IgnoreMode::Match),
            "regex" => Ok(IgnoreMode::Regex),
            other => Err(DiscoveryError::Config(format!(
                "Invalid ignore_mode '{}', expected 'match' or 'regex'",
                other
            ))),
        }
    }
}

impl fmt::Display for IgnoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreMode::Match => write!(f, "match"),
            IgnoreMode::Regex => write!(f, "regex"),
        }
    }
}

#[derive(Debug, Clone)]
enum Rule {
    Exact(String),
    Pattern(Regex),
}

impl Rule {
    fn matches(&self, name: &str) -> bool {
        match self {
            Rule::Exact(s) => s == name,
            Rule::Pattern(re) => re.is_match(name),
        }
    }
}

/// Compiled set of ignore rules.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<Rule>,
}

impl IgnoreRules {
    /// Compiles `entries`; fails on the first invalid regular expression.
    pub fn compile<S: AsRef<str>>(entries: &[S], default_mode: IgnoreMode) -> Result<Self> {
        let mut rules = Vec::with_capacity(entries.len());

        for entry in entries {
            let entry = entry.as_ref();
            let (mode, body) = if let Some(rest) = entry.strip_prefix(REGEX_PREFIX) {
                (IgnoreMode::Regex, rest)
            } else if let Some(rest) = entry.strip_prefix(MATCH_PREFIX) {
                (IgnoreMode::Match, rest)
            } else {
                (default_mode, entry)
            };

            let rule = match mode {
                IgnoreMode::Match => Rule::Exact(body.to_string()),
                IgnoreMode::Regex => {
                    Rule::Pattern(Regex::new(body).map_err(|source| {
                        DiscoveryError::InvalidPattern {
                            pattern: body.to_string(),
                            source,
                        }
                    })?)
                }
            };
            rules.push(rule);
        }

        Ok(Self { rules })
    }

    /// True when at least one rule matches `name`.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r.matches(name))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_by_default() {
        let rules = IgnoreRules::compile(&["sshd", "cron"], IgnoreMode::Match).unwrap();
        assert!(rules.is_ignored("sshd"));
        assert!(rules.is_ignored("cron"));
        assert!(!rules.is_ignored("sshd-session"));
        assert!(!rules.is_ignored("nginx"));
    }

    #[test]
    fn test_regex_mode_searches_within_name() {
        let rules = IgnoreRules::compile(&["^systemd", "agent$"], IgnoreMode::Regex).unwrap();
        assert!(rules.is_ignored("systemd-journald"));
        assert!(rules.is_ignored("ssh-agent"));
        assert!(!rules.is_ignored("my-systemd"));
    }

    #[test]
    fn test_prefix_overrides_default_mode() {
        let rules =
            IgnoreRules::compile(&["regex:^kworker/", "match:bash"], IgnoreMode::Match).unwrap();
        assert!(rules.is_ignored("kworker/0:1"));
        assert!(rules.is_ignored("bash"));
        assert!(!rules.is_ignored("bash5"));

        let rules = IgnoreRules::compile(&["match:a.c"], IgnoreMode::Regex).unwrap();
        assert!(rules.is_ignored("a.c"));
        assert!(!rules.is_ignored("abc"));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let err = IgnoreRules::compile(&["regex:(unclosed"], IgnoreMode::Match).unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_rules_ignore_nothing() {
        let rules = IgnoreRules::compile::<&str>(&[], IgnoreMode::Regex).unwrap();
        assert!(rules.is_empty());
        assert!(!rules.is_ignored("anything"));
    }

    #[test]
    fn test_ignore_mode_from_str() {
        assert_eq!("match".parse::<IgnoreMode>().unwrap(), IgnoreMode::Match);
        assert_eq!("regex".parse::<IgnoreMode>().unwrap(), IgnoreMode::Regex);
        assert!("glob".parse::<IgnoreMode>().is_err());
    }
}

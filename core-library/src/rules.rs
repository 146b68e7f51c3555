//! Album rules
//!
//! The album configuration is a YAML mapping from album name to rule:
//!
//! ```yaml
//! GreenButNotFriends:
//!   FilePath: '.*'
//!   KeywordsIncl: green
//!   KeywordsExcl: [friends]
//! ```
//!
//! Every field takes one pattern or a list of patterns. Patterns are regular
//! expressions anchored at the start of the subject only, so `green` also
//! matches `greenhouse`.
//!
//! Loading is lenient: structural problems are collected instead of stopping
//! at the first one, so [`AlbumRuleSet::validate`] can report all of them at
//! once. [`AlbumRuleSet::compile`] refuses a rule set with any problem.

use regex::Regex;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{LibraryError, Result};

pub const FILE_PATH: &str = "FilePath";
pub const KEYWORDS_INCL: &str = "KeywordsIncl";
pub const KEYWORDS_EXCL: &str = "KeywordsExcl";

const SUPPORTED_FIELDS: &[&str] = &[FILE_PATH, KEYWORDS_INCL, KEYWORDS_EXCL];

/// Patterns of one album, as written in the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlbumRule {
    /// Every pattern must match the short path (required)
    pub file_path: Option<Vec<String>>,
    /// Every pattern must match at least one keyword
    pub keywords_incl: Option<Vec<String>>,
    /// Excludes the photo when every pattern matches at least one keyword
    pub keywords_excl: Option<Vec<String>>,
}

/// A problem found in the album configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleIssue {
    /// The rule of the album is not a mapping
    InvalidRule { album: String },
    MissingFilePath { album: String },
    UnsupportedField { album: String, field: String },
    /// The field is neither a string nor a list of strings
    InvalidValue { album: String, field: String },
    InvalidPattern {
        album: String,
        field: String,
        pattern: String,
        message: String,
    },
}

impl RuleIssue {
    pub fn album(&self) -> &str {
        match self {
            RuleIssue::InvalidRule { album }
            | RuleIssue::MissingFilePath { album }
            | RuleIssue::UnsupportedField { album, .. }
            | RuleIssue::InvalidValue { album, .. }
            | RuleIssue::InvalidPattern { album, .. } => album,
        }
    }
}

impl fmt::Display for RuleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleIssue::InvalidRule { album } => {
                write!(f, "album '{}': rule must be a mapping of fields", album)
            }
            RuleIssue::MissingFilePath { album } => {
                write!(f, "album '{}': required field '{}' is missing", album, FILE_PATH)
            }
            RuleIssue::UnsupportedField { album, field } => write!(
                f,
                "album '{}': unsupported field '{}' (supported: {})",
                album,
                field,
                SUPPORTED_FIELDS.join(", ")
            ),
            RuleIssue::InvalidValue { album, field } => write!(
                f,
                "album '{}': field '{}' must be a string or a list of strings",
                album, field
            ),
            RuleIssue::InvalidPattern {
                album,
                field,
                pattern,
                message,
            } => write!(
                f,
                "album '{}': field '{}' has invalid pattern '{}': {}",
                album, field, pattern, message
            ),
        }
    }
}

/// Album name to rule mapping, loaded once per run
#[derive(Debug, Clone, Default)]
pub struct AlbumRuleSet {
    albums: BTreeMap<String, AlbumRule>,
    parse_issues: Vec<RuleIssue>,
}

impl AlbumRuleSet {
    /// Load the rule set from a YAML file.
    ///
    /// A missing file yields an empty rule set with a warning; any other read
    /// failure or a YAML syntax error is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let rules = Self::from_yaml_str(&content)?;
                debug!(path = %path.display(), albums = rules.len(), "Loaded album rules");
                Ok(rules)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Album config file not found, no albums configured");
                Ok(Self::default())
            }
            Err(source) => Err(LibraryError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse the rule set from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let blank = content.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        });
        if blank {
            return Ok(Self::default());
        }

        let document: Value = serde_yaml::from_str(content)
            .map_err(|e| LibraryError::Config(format!("Album config is not valid YAML: {}", e)))?;

        let mapping = match document {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            _ => {
                return Err(LibraryError::Config(
                    "Album config must map album names to rules".to_string(),
                ))
            }
        };

        let mut rules = Self::default();
        for (name, rule) in mapping {
            let Some(album) = scalar_to_string(&name) else {
                return Err(LibraryError::Config(format!(
                    "Album names must be strings, found {:?}",
                    name
                )));
            };
            let rule = rules.parse_rule(&album, rule);
            rules.albums.insert(album, rule);
        }

        Ok(rules)
    }

    fn parse_rule(&mut self, album: &str, value: Value) -> AlbumRule {
        let mut rule = AlbumRule::default();

        let mapping = match value {
            Value::Mapping(mapping) => mapping,
            Value::Null => return rule,
            _ => {
                self.parse_issues.push(RuleIssue::InvalidRule {
                    album: album.to_string(),
                });
                return rule;
            }
        };

        for (key, value) in mapping {
            let field = scalar_to_string(&key).unwrap_or_else(|| format!("{:?}", key));
            let slot = match field.as_str() {
                FILE_PATH => &mut rule.file_path,
                KEYWORDS_INCL => &mut rule.keywords_incl,
                KEYWORDS_EXCL => &mut rule.keywords_excl,
                _ => {
                    self.parse_issues.push(RuleIssue::UnsupportedField {
                        album: album.to_string(),
                        field,
                    });
                    continue;
                }
            };

            match patterns_of(&value) {
                Some(patterns) => *slot = Some(patterns),
                None => self.parse_issues.push(RuleIssue::InvalidValue {
                    album: album.to_string(),
                    field,
                }),
            }
        }

        rule
    }

    pub fn insert(&mut self, album: impl Into<String>, rule: AlbumRule) {
        self.albums.insert(album.into(), rule);
    }

    pub fn get(&self, album: &str) -> Option<&AlbumRule> {
        self.albums.get(album)
    }

    pub fn album_names(&self) -> impl Iterator<Item = &str> {
        self.albums.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }

    /// Keep only the albums named in `allow`; an empty list keeps everything.
    ///
    /// Returns the requested names that are not configured.
    pub fn retain_albums(&mut self, allow: &[String]) -> Vec<String> {
        if allow.is_empty() {
            return Vec::new();
        }

        let unknown: Vec<String> = allow
            .iter()
            .filter(|name| !self.albums.contains_key(name.as_str()))
            .cloned()
            .collect();
        for name in &unknown {
            warn!(album = %name, "Requested album is not configured");
        }

        self.albums.retain(|name, _| allow.contains(name));
        let albums = &self.albums;
        self.parse_issues
            .retain(|issue| albums.contains_key(issue.album()));

        unknown
    }

    /// Every problem of the rule set, in album order.
    pub fn validate(&self) -> Vec<RuleIssue> {
        let mut issues = self.parse_issues.clone();

        for (album, rule) in &self.albums {
            if rule.file_path.is_none() {
                issues.push(RuleIssue::MissingFilePath {
                    album: album.clone(),
                });
            }

            for (field, patterns) in rule.fields() {
                for pattern in patterns {
                    if let Err(e) = anchored(pattern) {
                        issues.push(RuleIssue::InvalidPattern {
                            album: album.clone(),
                            field: field.to_string(),
                            pattern: pattern.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        issues.sort_by(|a, b| a.album().cmp(b.album()));
        issues
    }

    /// Compile every rule, refusing the rule set if it has any problem.
    pub fn compile(&self) -> Result<Vec<CompiledRule>> {
        let issues = self.validate();
        if !issues.is_empty() {
            return Err(LibraryError::InvalidRules(issues));
        }

        self.albums
            .iter()
            .map(|(album, rule)| CompiledRule::new(album, rule))
            .collect()
    }
}

impl AlbumRule {
    pub fn new<I, S>(file_path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_path: Some(file_path.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn including<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords_incl = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn excluding<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords_excl = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    fn fields(&self) -> impl Iterator<Item = (&'static str, &Vec<String>)> {
        [
            (FILE_PATH, self.file_path.as_ref()),
            (KEYWORDS_INCL, self.keywords_incl.as_ref()),
            (KEYWORDS_EXCL, self.keywords_excl.as_ref()),
        ]
        .into_iter()
        .filter_map(|(field, patterns)| patterns.map(|p| (field, p)))
    }
}

/// Rule with its patterns compiled, ready for matching
#[derive(Debug, Clone)]
pub struct CompiledRule {
    album: String,
    file_path: Vec<Regex>,
    keywords_incl: Option<Vec<Regex>>,
    keywords_excl: Option<Vec<Regex>>,
}

impl CompiledRule {
    fn new(album: &str, rule: &AlbumRule) -> Result<Self> {
        let compile_all = |patterns: &Vec<String>| -> Result<Vec<Regex>> {
            patterns
                .iter()
                .map(|p| {
                    anchored(p).map_err(|e| {
                        LibraryError::Config(format!("album '{}': invalid pattern '{}': {}", album, p, e))
                    })
                })
                .collect()
        };

        let file_path = match &rule.file_path {
            Some(patterns) => compile_all(patterns)?,
            None => {
                return Err(LibraryError::InvalidRules(vec![RuleIssue::MissingFilePath {
                    album: album.to_string(),
                }]))
            }
        };

        Ok(Self {
            album: album.to_string(),
            file_path,
            keywords_incl: rule.keywords_incl.as_ref().map(compile_all).transpose()?,
            keywords_excl: rule.keywords_excl.as_ref().map(compile_all).transpose()?,
        })
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    /// Whether a photo with this short path and these keywords belongs to the album.
    ///
    /// `keywords` must not be empty; callers pass `[""]` for a photo without keywords.
    pub fn matches(&self, short_path: &str, keywords: &[String]) -> bool {
        if !self.file_path.iter().all(|re| re.is_match(short_path)) {
            return false;
        }

        let covered = |patterns: &Vec<Regex>| {
            patterns
                .iter()
                .all(|re| keywords.iter().any(|keyword| re.is_match(keyword)))
        };

        if let Some(include) = &self.keywords_incl {
            if !covered(include) {
                return false;
            }
        }

        if let Some(exclude) = &self.keywords_excl {
            if covered(exclude) {
                return false;
            }
        }

        true
    }
}

fn anchored(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})", pattern))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn patterns_of(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Sequence(items) => items.iter().map(scalar_to_string).collect(),
        other => scalar_to_string(other).map(|s| vec![s]),
    }
}

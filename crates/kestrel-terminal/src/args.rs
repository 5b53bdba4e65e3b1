//! Argument parsing: raw tokens into flags, options and positionals.
//!
//! Grammar, applied left to right:
//!
//! - `--key=value` sets option `key`; `--key` sets flag `key`.
//! - `-k value` sets option `k` when the next token does not start with `-`;
//!   otherwise `-k` is a flag.
//! - Anything else is positional and stays in [`Arguments::raw`].
//!
//! Parsing never fails. Later occurrences of a key replace earlier ones,
//! whether flag or option. Unknown keys are accepted; each command validates
//! what it understands.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use kestrel_types::{Result, ShellError};

/// A parsed value in the unified lookup map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgValue {
    Flag,
    Value(String),
}

/// Structured arguments of one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments {
    /// Positional tokens in input order. Commands may rewrite this, e.g. to
    /// substitute a default target.
    pub raw: Vec<String>,
    flags: BTreeSet<String>,
    options: BTreeMap<String, String>,
    parsed: BTreeMap<String, ArgValue>,
}

impl Arguments {
    pub fn parse<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let mut args = Arguments::default();
        let mut i = 0;

        while i < tokens.len() {
            let tok = &tokens[i];
            if let Some(long) = tok.strip_prefix("--") {
                match long.split_once('=') {
                    Some((key, value)) if !key.is_empty() => args.set_option(key, value),
                    None if !long.is_empty() => args.set_flag(long),
                    // `--` and `--=x` degrade to positionals.
                    _ => args.raw.push(tok.clone()),
                }
            } else if let Some(short) = tok.strip_prefix('-') {
                if short.is_empty() {
                    args.raw.push(tok.clone());
                } else {
                    match tokens.get(i + 1) {
                        Some(next) if !next.starts_with('-') => {
                            args.set_option(short, next);
                            i += 1;
                        },
                        _ => args.set_flag(short),
                    }
                }
            } else {
                args.raw.push(tok.clone());
            }
            i += 1;
        }

        args
    }

    /// Record a boolean flag, replacing any option with the same key.
    pub fn set_flag(&mut self, key: &str) {
        self.options.remove(key);
        self.flags.insert(key.to_string());
        self.parsed.insert(key.to_string(), ArgValue::Flag);
    }

    /// Record an option value, replacing any flag with the same key.
    pub fn set_option(&mut self, key: &str, value: &str) {
        self.flags.remove(key);
        self.options.insert(key.to_string(), value.to_string());
        self.parsed
            .insert(key.to_string(), ArgValue::Value(value.to_string()));
    }

    /// Whether `key` was given as a bare flag.
    pub fn flag(&self, key: &str) -> bool {
        self.flags.contains(key)
    }

    /// Whether `key` was given at all, as flag or option.
    pub fn has(&self, key: &str) -> bool {
        self.parsed.contains_key(key)
    }

    /// Value of option `key`.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Value of the first of `keys` that was given as an option.
    ///
    /// Used for short/long aliases such as `-p` / `--ports`.
    pub fn option_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.option(k))
    }

    pub fn option_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.option(key).unwrap_or(default)
    }

    /// Parse the first of `keys` given as an option into `T`.
    ///
    /// `Ok(None)` when absent; a malformed value is a validation error. A key
    /// given as a bare flag is also an error, since it is missing its value.
    pub fn parse_option<T>(&self, keys: &[&str]) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        for key in keys {
            if let Some(raw) = self.option(key) {
                return raw.parse::<T>().map(Some).map_err(|e| {
                    ShellError::Validation(format!("invalid value for {}: '{raw}' ({e})", dashed(key)))
                });
            }
            if self.flag(key) {
                return Err(ShellError::Validation(format!(
                    "{} requires a value",
                    dashed(key)
                )));
            }
        }
        Ok(None)
    }

    /// Positional token at `index`.
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.raw.get(index).map(String::as_str)
    }

    pub fn flags(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(String::as_str)
    }

    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Unified flag/option lookup.
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.parsed.get(key)
    }

    pub fn parsed(&self) -> &BTreeMap<String, ArgValue> {
        &self.parsed
    }

    /// No positionals, flags or options.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.parsed.is_empty()
    }
}

/// Render a key the way the user would have typed it.
fn dashed(key: &str) -> String {
    if key.chars().count() == 1 {
        format!("-{key}")
    } else {
        format!("--{key}")
    }
}

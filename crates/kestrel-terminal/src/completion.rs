//! Fuzzy command lookup, category browsing and line completion.

use std::collections::{BTreeMap, BTreeSet};

use kestrel_types::ShellConfig;

use crate::registry::CommandRegistry;

pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// How a candidate matched a query. Earlier variants rank higher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
    Description,
    Similar,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub name: String,
    pub kind: MatchKind,
}

/// Loose similarity used for typo hints.
///
/// Two short strings (both at most 5 chars, lengths within 2) are similar
/// when mismatched positions plus the length difference is at most 2.
/// Independently, strings are similar when the shorter one (at least 2
/// chars) is a prefix of the longer.
pub fn is_similar(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let (la, lb) = (a.chars().count(), b.chars().count());
    let len_diff = la.abs_diff(lb);

    if la <= 5 && lb <= 5 && len_diff <= 2 {
        let mismatched = a.chars().zip(b.chars()).filter(|(x, y)| x != y).count();
        if mismatched + len_diff <= 2 {
            return true;
        }
    }

    let (short, long) = if la <= lb { (a, b) } else { (b, a) };
    short.chars().count() >= 2 && long.starts_with(short)
}

fn classify(query: &str, name: &str, description: &str) -> Option<MatchKind> {
    if name == query {
        return Some(MatchKind::Exact);
    }
    let q = query.to_lowercase();
    let n = name.to_lowercase();
    if n.starts_with(&q) {
        Some(MatchKind::Prefix)
    } else if n.contains(&q) {
        Some(MatchKind::Substring)
    } else if description.to_lowercase().contains(&q) {
        Some(MatchKind::Description)
    } else if is_similar(query, name) {
        Some(MatchKind::Similar)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// CompletionIndex
// ---------------------------------------------------------------------------

/// Static completion data: candidates keyed by `cmd` or `cmd sub`, plus
/// ordered command lists per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionIndex {
    entries: BTreeMap<String, Vec<String>>,
    categories: BTreeMap<String, Vec<String>>,
}

impl CompletionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The table shipped with the shell.
    pub fn builtin() -> Self {
        let mut index = Self::new();
        index.add_category("file", ["ls", "pwd", "cat", "cp", "mv", "rm"]);
        index.add_category("network", ["ping", "resolve", "portscan", "traceroute"]);
        index.add_category("system", ["whoami", "hostname", "sysinfo", "sleep", "uptime"]);

        index.insert(
            "portscan",
            ["-p", "-t", "-c", "--ports=", "--timeout=", "--concurrency="],
        );
        index.insert("ping", ["-c", "-t", "-p", "--count=", "--timeout=", "--port="]);
        index.insert("ls", ["-a", "-l", "--all", "--long"]);
        index.insert("cat", ["-n"]);
        index.insert("sysinfo", ["os", "cpu", "memory", "all"]);
        index
    }

    /// Append candidates for `key`, skipping ones already present.
    pub fn insert<I, S>(&mut self, key: &str, candidates: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = self.entries.entry(key.to_string()).or_default();
        for c in candidates {
            let c = c.into();
            if !slot.contains(&c) {
                slot.push(c);
            }
        }
    }

    /// Merge user-supplied entries (the `[completions]` config table).
    pub fn extend_from(&mut self, extra: &BTreeMap<String, Vec<String>>) {
        for (key, candidates) in extra {
            self.insert(key, candidates.iter().cloned());
        }
    }

    pub fn add_category<I, S>(&mut self, category: &str, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let slot = self.categories.entry(category.to_string()).or_default();
        for c in commands {
            let c = c.into();
            if !slot.contains(&c) {
                slot.push(c);
            }
        }
    }

    /// Candidates for `cmd` or `cmd sub`; empty when unknown.
    pub fn candidates(&self, key: &str) -> &[String] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_entry(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Commands listed under `category`, in table order.
    pub fn category(&self, category: &str) -> Option<&[String]> {
        self.categories.get(category).map(Vec::as_slice)
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Completer
// ---------------------------------------------------------------------------

/// Query engine over a registry and a [`CompletionIndex`].
pub struct Completer<'r> {
    registry: &'r CommandRegistry,
    index: CompletionIndex,
    max: usize,
}

impl<'r> Completer<'r> {
    /// Completer over `registry` using the built-in index.
    pub fn new(registry: &'r CommandRegistry) -> Self {
        Self {
            registry,
            index: CompletionIndex::builtin(),
            max: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    /// Built-in index extended with the config's completions, and the
    /// config's suggestion cap.
    pub fn from_config(registry: &'r CommandRegistry, config: &ShellConfig) -> Self {
        let mut index = CompletionIndex::builtin();
        index.extend_from(&config.completions);
        Self::new(registry)
            .with_index(index)
            .with_max(config.max_suggestions)
    }

    pub fn with_index(mut self, index: CompletionIndex) -> Self {
        self.index = index;
        self
    }

    pub fn with_max(mut self, max: usize) -> Self {
        self.max = max.max(1);
        self
    }

    pub fn index(&self) -> &CompletionIndex {
        &self.index
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Ranked suggestions for `query`, capped at the configured maximum.
    pub fn suggest(&self, query: &str) -> Vec<Suggestion> {
        self.suggest_n(query, self.max)
    }

    /// Ranked suggestions for `query`, at most `limit`.
    pub fn suggest_n(&self, query: &str, limit: usize) -> Vec<Suggestion> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<Suggestion> = self
            .registry
            .iter()
            .filter_map(|cmd| {
                classify(query, cmd.name(), cmd.description()).map(|kind| Suggestion {
                    name: cmd.name().to_string(),
                    kind,
                })
            })
            .collect();
        ranked.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        let mut seen = BTreeSet::new();
        ranked.retain(|s| seen.insert(s.name.clone()));
        ranked.truncate(limit);
        log::trace!("suggest '{query}': {} match(es)", ranked.len());
        ranked
    }

    /// Best guess for a mistyped command name.
    pub fn did_you_mean(&self, query: &str) -> Option<String> {
        self.suggest_n(query, 1)
            .into_iter()
            .find(|s| s.kind != MatchKind::Exact)
            .map(|s| s.name)
    }

    /// Registered commands in `category`, in index order.
    ///
    /// Categories the index does not know fall back to the commands that
    /// declare that category themselves.
    pub fn browse(&self, category: &str) -> Vec<&str> {
        match self.index.category(category) {
            Some(listed) => listed
                .iter()
                .map(String::as_str)
                .filter(|name| self.registry.contains(name))
                .collect(),
            None => self.registry.commands_in(category),
        }
    }

    /// Sorted category names known to the index or declared by commands.
    pub fn categories(&self) -> Vec<&str> {
        self.index
            .category_names()
            .chain(self.registry.categories())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Candidates for the word under the cursor at the end of `line`.
    ///
    /// A single word completes to registered command names. After that the
    /// last word completes from the `cmd sub` entry when one exists, else
    /// from the `cmd` entry.
    pub fn complete(&self, line: &str) -> Vec<&str> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let trailing_space = line.ends_with(char::is_whitespace);

        let (context, partial) = match (words.split_last(), trailing_space) {
            (None, _) => (&[][..], ""),
            (Some(_), true) => (&words[..], ""),
            (Some((last, rest)), false) => (rest, *last),
        };

        let Some((&cmd, after)) = context.split_first() else {
            let mut names: Vec<&str> = self
                .registry
                .list()
                .into_iter()
                .filter(|n| n.starts_with(partial))
                .collect();
            names.sort_unstable();
            return names;
        };

        let key = match after.first() {
            Some(sub) if self.index.has_entry(&format!("{cmd} {sub}")) => format!("{cmd} {sub}"),
            _ => cmd.to_string(),
        };
        self.index
            .candidates(&key)
            .iter()
            .map(String::as_str)
            .filter(|c| c.starts_with(partial))
            .collect()
    }
}

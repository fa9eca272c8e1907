//! File globbing over a directory tree.
//!
//! Patterns are matched against paths relative to the glob root, with `/` as
//! separator on every platform. Supported syntax:
//!
//! - `*` any run of characters within one path segment
//! - `?` exactly one character
//! - `**` as a whole segment: zero or more segments
//! - `[abc]`, `[a-z]`, `[!x]` character classes
//!
//! Directories matched by an exclude pattern are pruned without being read.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use walkdir::{DirEntry, FilterEntry, WalkDir};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid glob pattern '{pattern}': {reason}")]
pub struct GlobError {
  pub pattern: String,
  pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
  Literal(char),
  AnyRun,
  AnyOne,
  Class { negated: bool, ranges: Vec<(char, char)> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
  AnyDepth,
  Part(Vec<Token>),
}

/// A compiled glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
  source: String,
  segments: Vec<Segment>,
}

impl Pattern {
  pub fn new(pattern: &str) -> Result<Self, GlobError> {
    let invalid = |reason| GlobError {
      pattern: pattern.to_string(),
      reason,
    };

    if pattern.is_empty() {
      return Err(invalid("pattern is empty"));
    }
    if pattern.starts_with('/') {
      return Err(invalid("pattern must be relative to the glob root"));
    }

    let mut segments = Vec::new();
    for part in pattern.split('/').filter(|part| !part.is_empty()) {
      if part == "**" {
        segments.push(Segment::AnyDepth);
      } else if part.contains("**") {
        return Err(invalid("'**' must be a whole path segment"));
      } else {
        segments.push(Segment::Part(tokenize(part).map_err(invalid)?));
      }
    }

    Ok(Self {
      source: pattern.to_string(),
      segments,
    })
  }

  pub fn as_str(&self) -> &str {
    &self.source
  }

  /// Match a `/`-separated relative path.
  pub fn matches(&self, relative: &str) -> bool {
    let parts: Vec<&str> = relative.split('/').filter(|part| !part.is_empty()).collect();
    match_segments(&self.segments, &parts)
  }

  pub fn matches_path(&self, relative: &Path) -> bool {
    self.matches(&to_slash(relative))
  }
}

fn tokenize(part: &str) -> Result<Vec<Token>, &'static str> {
  let mut tokens = Vec::new();
  let mut chars = part.chars().peekable();

  while let Some(ch) = chars.next() {
    match ch {
      '*' => tokens.push(Token::AnyRun),
      '?' => tokens.push(Token::AnyOne),
      '[' => {
        let negated = chars.next_if_eq(&'!').is_some();
        let mut ranges = Vec::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
          if c == ']' && !ranges.is_empty() {
            closed = true;
            break;
          }
          if chars.peek() == Some(&'-') {
            chars.next();
            match chars.next() {
              Some(']') | None => {
                ranges.push((c, c));
                ranges.push(('-', '-'));
                closed = true;
                break;
              }
              Some(end) if end < c => return Err("character range is reversed"),
              Some(end) => ranges.push((c, end)),
            }
          } else {
            ranges.push((c, c));
          }
        }
        if !closed {
          return Err("unclosed character class");
        }
        tokens.push(Token::Class { negated, ranges });
      }
      other => tokens.push(Token::Literal(other)),
    }
  }

  Ok(tokens)
}

fn match_segments(segments: &[Segment], parts: &[&str]) -> bool {
  match segments.split_first() {
    None => parts.is_empty(),
    Some((Segment::AnyDepth, rest)) => (0..=parts.len()).any(|skip| match_segments(rest, &parts[skip..])),
    Some((Segment::Part(tokens), rest)) => match parts.split_first() {
      Some((first, tail)) => {
        let chars: Vec<char> = first.chars().collect();
        match_tokens(tokens, &chars) && match_segments(rest, tail)
      }
      None => false,
    },
  }
}

fn match_tokens(tokens: &[Token], text: &[char]) -> bool {
  match tokens.split_first() {
    None => text.is_empty(),
    Some((Token::AnyRun, rest)) => (0..=text.len()).any(|skip| match_tokens(rest, &text[skip..])),
    Some((token, rest)) => match text.split_first() {
      Some((ch, tail)) => match_char(token, *ch) && match_tokens(rest, tail),
      None => false,
    },
  }
}

fn match_char(token: &Token, ch: char) -> bool {
  match token {
    Token::Literal(expected) => *expected == ch,
    Token::AnyOne => true,
    Token::AnyRun => true,
    Token::Class { negated, ranges } => ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&ch)) != *negated,
  }
}

fn to_slash(path: &Path) -> String {
  path
    .components()
    .map(|component| component.as_os_str().to_string_lossy())
    .collect::<Vec<_>>()
    .join("/")
}

/// A set of include and exclude patterns rooted at a directory.
///
/// With no include pattern every file under the root matches.
#[derive(Debug, Clone)]
pub struct Glob {
  root: PathBuf,
  include: Vec<String>,
  exclude: Vec<String>,
}

impl Glob {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      include: Vec::new(),
      exclude: Vec::new(),
    }
  }

  pub fn include(mut self, pattern: &str) -> Self {
    self.include.push(pattern.to_string());
    self
  }

  pub fn exclude(mut self, pattern: &str) -> Self {
    self.exclude.push(pattern.to_string());
    self
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Compile the patterns and start walking. Files are yielded lazily, sorted by name within each directory.
  pub fn files(&self) -> Result<GlobIter, GlobError> {
    let include = compile(&self.include)?;
    let exclude: Arc<[Pattern]> = compile(&self.exclude)?.into();

    let root = self.root.clone();
    let prune_root = root.clone();
    let prune: PruneFn = Box::new(move |entry: &DirEntry| {
      if entry.depth() == 0 {
        return true;
      }
      let relative = entry.path().strip_prefix(&prune_root).unwrap_or(entry.path());
      !exclude.iter().any(|pattern| pattern.matches_path(relative))
    });

    Ok(GlobIter {
      walker: WalkDir::new(&self.root).sort_by_file_name().into_iter().filter_entry(prune),
      root,
      include,
    })
  }

  /// Collect every matching file.
  pub fn collect(&self) -> Result<Vec<PathBuf>, GlobError> {
    Ok(self.files()?.collect())
  }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, GlobError> {
  patterns.iter().map(|pattern| Pattern::new(pattern)).collect()
}

type PruneFn = Box<dyn FnMut(&DirEntry) -> bool + Send>;

/// Lazy iterator over the files a [`Glob`] matches.
pub struct GlobIter {
  walker: FilterEntry<walkdir::IntoIter, PruneFn>,
  root: PathBuf,
  include: Vec<Pattern>,
}

impl Iterator for GlobIter {
  type Item = PathBuf;

  fn next(&mut self) -> Option<PathBuf> {
    loop {
      let entry = match self.walker.next()? {
        Ok(entry) => entry,
        Err(err) => {
          warn!(root = %self.root.display(), error = %err, "skipping unreadable entry");
          continue;
        }
      };
      if entry.file_type().is_dir() {
        continue;
      }
      let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
      if self.include.is_empty() || self.include.iter().any(|pattern| pattern.matches_path(relative)) {
        return Some(entry.into_path());
      }
    }
  }
}

//! Project evaluation: property expansion, conditions and item globbing.

use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

use super::instance::{ItemInstance, ProjectInstance};
use super::project::ProjectFile;
use super::properties::PropertyMap;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConditionError {
  #[error("unterminated string in condition: {0}")]
  UnterminatedString(String),

  #[error("unexpected token '{token}' in condition: {condition}")]
  UnexpectedToken { token: String, condition: String },

  #[error("unexpected end of condition: {0}")]
  UnexpectedEnd(String),
}

/// Evaluate a project file with the given global properties.
///
/// Global properties win over anything the file defines. Property groups
/// are applied in order, then items are expanded against the final
/// property values.
pub fn evaluate(path: &Path, file: &ProjectFile, globals: &PropertyMap) -> ProjectInstance {
  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  let mut properties = reserved_properties(path);
  for (name, value) in globals.iter() {
    properties.set(name, value);
  }

  for group in &file.property_groups {
    if !condition_holds(group.condition.as_deref(), &properties, dir) {
      continue;
    }
    for (name, raw) in group.properties.iter() {
      if globals.contains(name) {
        continue;
      }
      let value = expand(raw, &properties, &[]);
      properties.set(name, value);
    }
  }

  let mut items = Vec::new();
  for def in &file.items {
    if !condition_holds(def.condition.as_deref(), &properties, dir) {
      continue;
    }
    let excluded: Vec<String> = def
      .exclude
      .as_deref()
      .map(|exclude| expand_includes(&expand(exclude, &properties, &[]), dir))
      .unwrap_or_default();

    for include in expand_includes(&expand(&def.include, &properties, &items), dir) {
      if excluded.iter().any(|e| e == &include) {
        continue;
      }
      let metadata = def
        .metadata
        .iter()
        .map(|(name, value)| (name.clone(), expand(value, &properties, &items)))
        .collect();
      items.push(ItemInstance::new(&def.item_type, include, metadata, dir));
    }
  }

  ProjectInstance::new(
    path.to_path_buf(),
    properties,
    globals.clone(),
    items,
    file.targets.clone(),
    file.default_targets.clone(),
  )
}

fn reserved_properties(path: &Path) -> PropertyMap {
  let mut properties = PropertyMap::new();
  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  let file_name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
  let name = file_name.split('.').next().unwrap_or_default().to_string();

  properties.set("MSBuildProjectDirectory", dir.to_string_lossy());
  properties.set("MSBuildProjectFile", file_name);
  properties.set("MSBuildProjectName", name);
  properties.set("MSBuildProjectFullPath", path.to_string_lossy());
  properties
}

/// Expand `$(Property)` and `@(ItemType)` references.
///
/// Unknown properties expand to the empty string; item lists join their
/// includes with `;`.
pub fn expand(raw: &str, properties: &PropertyMap, items: &[ItemInstance]) -> String {
  let mut result = String::with_capacity(raw.len());
  let mut chars = raw.chars().peekable();

  while let Some(c) = chars.next() {
    if (c == '$' || c == '@') && chars.peek() == Some(&'(') {
      chars.next();
      let name: String = chars.by_ref().take_while(|&ch| ch != ')').collect();
      let name = name.trim();
      if c == '$' {
        if let Some(value) = properties.get(name) {
          result.push_str(value);
        }
      } else {
        let joined: Vec<&str> = items
          .iter()
          .filter(|item| item.item_type().eq_ignore_ascii_case(name))
          .map(ItemInstance::include)
          .collect();
        result.push_str(&joined.join(";"));
      }
    } else {
      result.push(c);
    }
  }

  result
}

/// Split an include list and expand wildcard entries against the filesystem.
fn expand_includes(include: &str, dir: &Path) -> Vec<String> {
  let mut expanded = Vec::new();
  for entry in include.split(';').map(str::trim).filter(|e| !e.is_empty()) {
    if entry.contains('*') || entry.contains('?') {
      expanded.extend(glob(entry, dir));
    } else {
      expanded.push(entry.to_string());
    }
  }
  expanded
}

/// Match a relative wildcard pattern against files under `dir`.
///
/// `*` and `?` stay within one path segment; `**` spans directories.
/// Matching ignores case. An invalid pattern matches nothing.
fn glob(pattern: &str, dir: &Path) -> Vec<String> {
  let normalized = pattern.replace('\\', "/");
  let matcher = match GlobBuilder::new(&normalized)
    .literal_separator(true)
    .case_insensitive(true)
    .backslash_escape(false)
    .build()
  {
    Ok(glob) => glob.compile_matcher(),
    Err(e) => {
      warn!(pattern = %normalized, error = %e, "ignoring invalid wildcard");
      return Vec::new();
    }
  };

  let root = normalized
    .split('/')
    .take_while(|s| !s.contains(['*', '?', '[', '{']))
    .fold(dir.to_path_buf(), |acc, s| acc.join(s));

  let mut matches: Vec<String> = WalkDir::new(&root)
    .follow_links(false)
    .into_iter()
    .filter_map(Result::ok)
    .filter(|entry| entry.file_type().is_file())
    .filter_map(|entry| {
      let relative = to_forward_slashes(entry.path().strip_prefix(dir).ok()?);
      matcher.is_match(&relative).then_some(relative)
    })
    .collect();
  matches.sort();
  matches
}

fn to_forward_slashes(path: &Path) -> String {
  path
    .components()
    .filter_map(|c| match c {
      Component::Normal(part) => Some(part.to_string_lossy().to_string()),
      _ => None,
    })
    .collect::<Vec<_>>()
    .join("/")
}

/// Evaluate an optional condition, logging and rejecting malformed ones.
pub fn condition_holds(condition: Option<&str>, properties: &PropertyMap, dir: &Path) -> bool {
  let Some(condition) = condition else {
    return true;
  };
  match evaluate_condition(condition, properties, dir) {
    Ok(value) => value,
    Err(e) => {
      warn!(condition = %condition, error = %e, "ignoring malformed condition");
      false
    }
  }
}

/// Evaluate a condition expression.
///
/// Supports quoted operands with property expansion, `==` and `!=`
/// (case-insensitive), `Exists('path')`, `!`, `and`, `or` and parentheses.
pub fn evaluate_condition(condition: &str, properties: &PropertyMap, dir: &Path) -> Result<bool, ConditionError> {
  if condition.trim().is_empty() {
    return Ok(true);
  }
  let tokens = tokenize(condition)?;
  let mut parser = Parser {
    tokens: &tokens,
    pos: 0,
    condition,
    properties,
    dir,
  };
  let value = parser.or_expr()?;
  match parser.tokens.get(parser.pos) {
    None => Ok(value),
    Some(token) => Err(parser.unexpected(token)),
  }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Str(String),
  Word(String),
  Eq,
  Ne,
  Not,
  LParen,
  RParen,
}

impl Token {
  fn describe(&self) -> String {
    match self {
      Token::Str(s) => format!("'{s}'"),
      Token::Word(w) => w.clone(),
      Token::Eq => "==".into(),
      Token::Ne => "!=".into(),
      Token::Not => "!".into(),
      Token::LParen => "(".into(),
      Token::RParen => ")".into(),
    }
  }
}

fn tokenize(condition: &str) -> Result<Vec<Token>, ConditionError> {
  let mut tokens = Vec::new();
  let mut chars = condition.chars().peekable();

  while let Some(&c) = chars.peek() {
    match c {
      c if c.is_whitespace() => {
        chars.next();
      }
      '\'' => {
        chars.next();
        let mut value = String::new();
        let mut closed = false;
        for ch in chars.by_ref() {
          if ch == '\'' {
            closed = true;
            break;
          }
          value.push(ch);
        }
        if !closed {
          return Err(ConditionError::UnterminatedString(condition.to_string()));
        }
        tokens.push(Token::Str(value));
      }
      '=' => {
        chars.next();
        if chars.next() != Some('=') {
          return Err(ConditionError::UnexpectedToken {
            token: "=".into(),
            condition: condition.to_string(),
          });
        }
        tokens.push(Token::Eq);
      }
      '!' => {
        chars.next();
        if chars.peek() == Some(&'=') {
          chars.next();
          tokens.push(Token::Ne);
        } else {
          tokens.push(Token::Not);
        }
      }
      '(' => {
        chars.next();
        tokens.push(Token::LParen);
      }
      ')' => {
        chars.next();
        tokens.push(Token::RParen);
      }
      _ => {
        let mut word = String::new();
        while let Some(&ch) = chars.peek() {
          if ch.is_whitespace() || matches!(ch, '\'' | '=' | '!' | '(' | ')') {
            break;
          }
          word.push(ch);
          chars.next();
        }
        tokens.push(Token::Word(word));
      }
    }
  }

  Ok(tokens)
}

struct Parser<'a> {
  tokens: &'a [Token],
  pos: usize,
  condition: &'a str,
  properties: &'a PropertyMap,
  dir: &'a Path,
}

impl Parser<'_> {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos)
  }

  fn next(&mut self) -> Result<Token, ConditionError> {
    let token = self
      .tokens
      .get(self.pos)
      .cloned()
      .ok_or_else(|| ConditionError::UnexpectedEnd(self.condition.to_string()))?;
    self.pos += 1;
    Ok(token)
  }

  fn unexpected(&self, token: &Token) -> ConditionError {
    ConditionError::UnexpectedToken {
      token: token.describe(),
      condition: self.condition.to_string(),
    }
  }

  fn is_keyword(&self, keyword: &str) -> bool {
    matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
  }

  fn or_expr(&mut self) -> Result<bool, ConditionError> {
    let mut value = self.and_expr()?;
    while self.is_keyword("or") {
      self.pos += 1;
      let rhs = self.and_expr()?;
      value = value || rhs;
    }
    Ok(value)
  }

  fn and_expr(&mut self) -> Result<bool, ConditionError> {
    let mut value = self.unary()?;
    while self.is_keyword("and") {
      self.pos += 1;
      let rhs = self.unary()?;
      value = value && rhs;
    }
    Ok(value)
  }

  fn unary(&mut self) -> Result<bool, ConditionError> {
    if self.peek() == Some(&Token::Not) {
      self.pos += 1;
      return Ok(!self.unary()?);
    }
    self.primary()
  }

  fn primary(&mut self) -> Result<bool, ConditionError> {
    match self.next()? {
      Token::LParen => {
        let value = self.or_expr()?;
        match self.next()? {
          Token::RParen => Ok(value),
          other => Err(self.unexpected(&other)),
        }
      }
      Token::Word(w) if w.eq_ignore_ascii_case("exists") => {
        let open = self.next()?;
        if open != Token::LParen {
          return Err(self.unexpected(&open));
        }
        let path = match self.next()? {
          Token::Str(s) => expand(&s, self.properties, &[]),
          other => return Err(self.unexpected(&other)),
        };
        let close = self.next()?;
        if close != Token::RParen {
          return Err(self.unexpected(&close));
        }
        let path = PathBuf::from(path.trim());
        Ok(!path.as_os_str().is_empty() && self.dir.join(path).exists())
      }
      token @ (Token::Str(_) | Token::Word(_)) => {
        let lhs = self.operand(token);
        match self.peek() {
          Some(Token::Eq) | Some(Token::Ne) => {
            let negate = self.next()? == Token::Ne;
            let rhs = match self.next()? {
              t @ (Token::Str(_) | Token::Word(_)) => self.operand(t),
              other => return Err(self.unexpected(&other)),
            };
            Ok(lhs.eq_ignore_ascii_case(&rhs) != negate)
          }
          _ => Ok(lhs.eq_ignore_ascii_case("true")),
        }
      }
      other => Err(self.unexpected(&other)),
    }
  }

  fn operand(&self, token: Token) -> String {
    match token {
      Token::Str(s) | Token::Word(s) => expand(&s, self.properties, &[]),
      _ => String::new(),
    }
  }
}

// Live configuration store the snoozes are applied to
// The on-disk variant is a user-level settings.json with dotted keys

use crate::snooze::persistence::atomic_write;
use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Setting that supplies the CLI's default snooze duration
pub const DEFAULT_DURATION_KEY: &str = "snoozeSetting.defaultDuration";

/// Fallback when [`DEFAULT_DURATION_KEY`] is unset or not a positive integer
pub const FALLBACK_DEFAULT_DURATION: i64 = 30;

/// Key-value configuration store with global (user-level) scope
pub trait ConfigStore {
    /// Current live value, `None` when the key does not exist
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&mut self, key: &str, value: &Value) -> Result<()>;
}

/// Read the default snooze duration in minutes from the live settings.
///
/// Read on every prompt, never cached.
pub fn default_duration<C: ConfigStore + ?Sized>(store: &C) -> i64 {
    store
        .get(DEFAULT_DURATION_KEY)
        .ok()
        .flatten()
        .and_then(|v| v.as_i64())
        .filter(|minutes| *minutes > 0)
        .unwrap_or(FALLBACK_DEFAULT_DURATION)
}

/// Settings file holding a single JSON object.
///
/// Keys are looked up verbatim first (`"editor.fontSize": 14`), then as a
/// dotted path into nested objects (`"editor": {"fontSize": 14}`). The file
/// is re-read on every access so edits made by other programs are seen.
#[derive(Debug, Clone)]
pub struct JsonSettingsFile {
    path: PathBuf,
}

impl JsonSettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings file: {}", self.path.display()))?;

        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&strip_jsonc(&contents)).with_context(|| {
            format!("Failed to parse settings file: {}", self.path.display())
        })? {
            Value::Object(map) => Ok(map),
            _ => bail!(
                "Settings file is not a JSON object: {}",
                self.path.display()
            ),
        }
    }
}

/// Reduce JSON with comments (the editor's settings dialect) to plain JSON.
///
/// Drops `//` and `/* */` comments and commas that directly precede `}` or
/// `]`. String contents are left untouched. Comments are not written back.
pub fn strip_jsonc(text: &str) -> String {
    let chars: Vec<char> = text.trim_start_matches('\u{feff}').chars().collect();
    let mut out = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '"' => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(chars.len());
                out.extend(&chars[start..i]);
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
                out.push(' ');
                continue;
            }
            ',' if closes_after_comma(&chars[i + 1..]) => {}
            c => out.push(c),
        }
        i += 1;
    }

    out
}

/// Whether the next token after a comma closes an object or array
fn closes_after_comma(rest: &[char]) -> bool {
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            c if c.is_whitespace() => i += 1,
            '/' if rest.get(i + 1) == Some(&'/') => {
                while i < rest.len() && rest[i] != '\n' {
                    i += 1;
                }
            }
            '/' if rest.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < rest.len() && !(rest[i] == '*' && rest.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
            }
            c => return c == '}' || c == ']',
        }
    }
    false
}

fn lookup_nested<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    let mut parts = key.split('.');
    let mut current = root.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn lookup_nested_mut<'a>(root: &'a mut Map<String, Value>, key: &str) -> Option<&'a mut Value> {
    let mut parts = key.split('.');
    let mut current = root.get_mut(parts.next()?)?;
    for part in parts {
        current = current.as_object_mut()?.get_mut(part)?;
    }
    Some(current)
}

impl ConfigStore for JsonSettingsFile {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let settings = self.read()?;
        if let Some(value) = settings.get(key) {
            return Ok(Some(value.clone()));
        }
        Ok(lookup_nested(&settings, key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        let mut settings = self.read()?;

        if settings.contains_key(key) {
            settings.insert(key.to_string(), value.clone());
        } else if let Some(slot) = lookup_nested_mut(&mut settings, key) {
            *slot = value.clone();
        } else {
            settings.insert(key.to_string(), value.clone());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory: {}", parent.display())
            })?;
        }

        let contents = serde_json::to_string_pretty(&Value::Object(settings))
            .with_context(|| "Failed to serialize settings")?;
        atomic_write(&self.path, &format!("{}\n", contents))
    }
}

/// In-process configuration store
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    values: HashMap<String, Value>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<K, I>(values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Direct read without going through the trait's `Result`
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        self.values.insert(key.to_string(), value.clone());
        Ok(())
    }
}

use crate::shell::command::{CommandError, tokenize};
use std::collections::BTreeMap;

/// Command shortcuts; every word of a line is looked up once
#[derive(Debug, Default)]
pub struct Aliases {
    map: BTreeMap<String, String>,
}

impl Aliases {
    pub fn define(&mut self, name: String, value: String) {
        self.map.insert(name, value);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.map.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    /// One `name<TAB>value` line per alias
    pub fn render(&self) -> String {
        self.map
            .iter()
            .map(|(name, value)| format!("{}\t{}\n", name, value))
            .collect()
    }

    /// Replaces each word that names an alias with the words of its value.
    /// Not recursive. `alias` and `unalias` lines are left alone so their
    /// arguments stay names.
    pub fn expand(&self, words: Vec<String>) -> Result<Vec<String>, CommandError> {
        if matches!(words.first().map(String::as_str), Some("alias" | "unalias")) {
            return Ok(words);
        }

        let mut expanded = Vec::with_capacity(words.len());
        for word in words {
            match self.map.get(&word) {
                Some(value) => expanded.extend(tokenize(value)?),
                None => expanded.push(word),
            }
        }
        Ok(expanded)
    }
}

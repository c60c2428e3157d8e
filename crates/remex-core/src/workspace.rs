//! In-memory multi-file workspace
//!
//! The editor keeps its files in a process-local map, seeded with one default
//! entry at session start and never persisted. Also home to the static
//! lookups tied to file identity: extension to language routing and language
//! name to editor syntax mode.

use std::collections::HashMap;

use crate::core_types::Flavor;
use crate::errors::ClientError;

/// Language a file routes to when only its extension is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionBinding {
    pub flavor: Flavor,
    pub language_id: i64,
}

const PLAIN_TEXT: ExtensionBinding = ExtensionBinding { flavor: Flavor::Ce, language_id: 43 };

/// Map a file extension to its language. Unknown extensions fall back to
/// Plain Text.
pub fn language_for_extension(extension: &str) -> ExtensionBinding {
    match extension.to_ascii_lowercase().as_str() {
        "js" => ExtensionBinding { flavor: Flavor::Ce, language_id: 63 },
        "py" => ExtensionBinding { flavor: Flavor::Ce, language_id: 71 },
        "rs" => ExtensionBinding { flavor: Flavor::Ce, language_id: 73 },
        "sh" => ExtensionBinding { flavor: Flavor::Ce, language_id: 46 },
        "txt" => PLAIN_TEXT,
        _ => PLAIN_TEXT,
    }
}

/// Derive the editor syntax mode from a language display name.
pub fn editor_mode_for(language_name: &str) -> &'static str {
    const MODES: [(&str, &str); 4] =
        [("bash", "shell"), ("python", "python"), ("rust", "rust"), ("r ", "r")];

    let lowered = language_name.to_ascii_lowercase();
    for (prefix, mode) in MODES {
        if lowered.starts_with(prefix) {
            return mode;
        }
    }
    "plaintext"
}

/// Filename to source text, unique keys, one designated current file.
#[derive(Debug, Clone)]
pub struct VirtualFileSet {
    files: HashMap<String, String>,
    current: String,
}

impl VirtualFileSet {
    pub fn new(default_name: &str, default_content: &str) -> Self {
        let mut files = HashMap::new();
        files.insert(default_name.to_string(), default_content.to_string());
        Self { files, current: default_name.to_string() }
    }

    pub fn current_name(&self) -> &str {
        &self.current
    }

    pub fn current_content(&self) -> &str {
        self.files.get(&self.current).map(String::as_str).unwrap_or_default()
    }

    /// Save the live editor buffer back into the current entry.
    pub fn save_current(&mut self, content: &str) {
        self.files.insert(self.current.clone(), content.to_string());
    }

    /// Create a file (replacing any same-named entry) and make it current.
    /// Returns the content the editor should load.
    pub fn create(&mut self, name: &str, content: &str) -> String {
        self.files.insert(name.to_string(), content.to_string());
        self.current = name.to_string();
        content.to_string()
    }

    /// Switch to an existing file, saving the in-flight buffer first.
    /// Returns the content the editor should load.
    pub fn switch_to(&mut self, name: &str, live_buffer: &str) -> Result<String, ClientError> {
        if !self.files.contains_key(name) {
            return Err(ClientError::Workspace(format!("no such file: {}", name)));
        }
        self.save_current(live_buffer);
        self.current = name.to_string();
        Ok(self.files[name].clone())
    }

    /// Delete the current file and fall back to another one. The last
    /// remaining file cannot be deleted.
    pub fn delete_current(&mut self) -> Result<String, ClientError> {
        if self.files.len() <= 1 {
            return Err(ClientError::Workspace("cannot delete the last file".to_string()));
        }
        self.files.remove(&self.current);
        let next = self
            .file_names()
            .into_iter()
            .next()
            .unwrap_or_default();
        self.current = next.clone();
        Ok(next)
    }

    /// Sorted for deterministic display.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.keys().cloned().collect();
        names.sort();
        names
    }
}

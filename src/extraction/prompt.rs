//! Layered prompt builder for the extraction system prompt.
//!
//! Prompts are assembled from plain-text template fragments stored under the
//! configured prompts directory (`config/prompts/` by default). Each layer is
//! appended in order; missing files are skipped, or replaced by a built-in
//! fallback when one is given.
//!
//! Variable substitution uses `{{key}}` syntax and is applied once at
//! [`build()`](PromptBuilder::build) time, after all layers are joined.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const SEPARATOR: &str = "\n\n";

/// File name of the extraction ("loom") instructions.
pub const LOOM_PROMPT_FILE: &str = "loom.md";

/// Built-in loom instructions, used when `loom.md` is absent.
pub const DEFAULT_LOOM_PROMPT: &str = "\
You are the Loom. Weave the input into the current Knowledge Graph.
Current Nodes: {{nodes}}

Rules:
1. Entity Resolution: If an entity exists (check 'label'), do NOT create a new node. Reuse its exact label.
2. Attributes: Add new info to 'attributes' (like 'timestamp' for Events, 'coordinates' for Places). Use null when you have nothing to say about an attribute.
3. Links: Create edges between nodes using labels. Predicates are UPPER_SNAKE_CASE verbs such as LIVES_IN or FRIEND_OF.
4. Follow-up: Ask the user a question to gather more information about the graph. Focus on missing connections or details. Do not ask if they want to know more.
5. Deletions: If the user says a relationship doesn't exist or is not true (e.g., 'X is not Y'), put it in 'edgesToRemove'. Do NOT create an edge with a 'NOT_' predicate.";

/// Fluent builder that assembles a layered prompt from template files.
pub struct PromptBuilder {
    prompts_dir: PathBuf,
    parts: Vec<String>,
    vars: HashMap<String, String>,
}

impl PromptBuilder {
    /// Create a builder rooted at `prompts_dir` (e.g. `"config/prompts"`).
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Self {
        Self {
            prompts_dir: prompts_dir.into(),
            parts: Vec::new(),
            vars: HashMap::new(),
        }
    }

    /// Append a layer by loading `filename` from the prompts directory.
    /// Silently skips the layer when the file does not exist.
    pub fn layer(self, filename: &str) -> Self {
        self.layer_or(filename, "")
    }

    /// Like [`layer`](Self::layer), but appends `fallback` when the file is
    /// missing or empty.
    pub fn layer_or(mut self, filename: &str, fallback: &str) -> Self {
        let path = self.prompts_dir.join(filename);
        let text = match fs::read_to_string(&path) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(_) => {
                tracing::debug!("prompt: layer '{}' not found, using fallback", path.display());
                fallback.to_string()
            }
        };
        self.push(text);
        self
    }

    /// Directly append a text fragment.
    pub fn append(mut self, text: impl Into<String>) -> Self {
        self.push(text.into());
        self
    }

    /// Register a single `{{key}}` → `value` substitution.
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.insert(key.to_string(), value.into());
        self
    }

    /// Assemble all layers, join with blank lines, and apply variable substitution.
    pub fn build(self) -> String {
        let mut prompt = self.parts.join(SEPARATOR);
        for (k, v) in &self.vars {
            let placeholder = format!("{{{{{k}}}}}");
            prompt = prompt.replace(&placeholder, v);
        }
        prompt
    }

    fn push(&mut self, text: String) {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            self.parts.push(trimmed.to_string());
        }
    }
}

/// Build the extraction system prompt for the given serialised node list.
pub fn loom_prompt(prompts_dir: impl AsRef<Path>, nodes_json: &str) -> String {
    PromptBuilder::new(prompts_dir.as_ref())
        .layer_or(LOOM_PROMPT_FILE, DEFAULT_LOOM_PROMPT)
        .layer("loom_extra.md")
        .var("nodes", nodes_json)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn builder_skips_missing_file() {
        let result = PromptBuilder::new("/nonexistent/prompts")
            .layer("nonexistent_file_xyz.md")
            .append("hello")
            .build();
        assert_eq!(result, "hello");
    }

    #[test]
    fn builder_substitutes_variable() {
        let result = PromptBuilder::new("/nonexistent/prompts")
            .append("Nodes: {{nodes}}")
            .var("nodes", "[]")
            .build();
        assert_eq!(result, "Nodes: []");
    }

    #[test]
    fn builder_joins_layers_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "first\n").unwrap();
        fs::write(dir.path().join("b.md"), "  second  ").unwrap();
        let result = PromptBuilder::new(dir.path()).layer("a.md").layer("b.md").build();
        assert_eq!(result, "first\n\nsecond");
    }

    #[test]
    fn loom_prompt_falls_back_to_builtin() {
        let result = loom_prompt("/nonexistent/prompts", r#"[{"label":"Alice"}]"#);
        assert!(result.starts_with("You are the Loom."));
        assert!(result.contains(r#"Current Nodes: [{"label":"Alice"}]"#));
        assert!(!result.contains("{{nodes}}"));
    }

    #[test]
    fn loom_prompt_prefers_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LOOM_PROMPT_FILE), "Custom loom. Known: {{nodes}}").unwrap();
        fs::write(dir.path().join("loom_extra.md"), "Answer in French.").unwrap();
        let result = loom_prompt(dir.path(), "[]");
        assert_eq!(result, "Custom loom. Known: []\n\nAnswer in French.");
    }

    #[test]
    fn empty_file_uses_fallback() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(LOOM_PROMPT_FILE), "   \n").unwrap();
        let result = loom_prompt(dir.path(), "[]");
        assert!(result.starts_with("You are the Loom."));
    }
}

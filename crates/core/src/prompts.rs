//! System prompt templates, loaded from a directory of Markdown files.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Loads every `*.md` file in `prompts_path`, keyed by file stem.
pub fn load_prompts(prompts_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    let entries = fs::read_dir(prompts_path)
        .with_context(|| format!("Could not read prompts directory {}", prompts_path.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

/// Replaces each `{name}` placeholder with its value.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

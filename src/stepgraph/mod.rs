//! Immutable, in-memory step graph loaded from a declarative JSON file at
//! startup. Every `next_step` referenced by an `Input` is expected to exist
//! in the same map; the engine treats a dangling reference as an internal
//! error, not a panic.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

/// Either a plain localization key or a marker telling the engine to call
/// an action to compute the step's body dynamically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    LocalizationKey(String),
    DynamicAction(String),
}

impl Content {
    fn parse(raw: &str) -> Self {
        match raw.strip_suffix(":fn") {
            Some(action) => Content::DynamicAction(action.to_string()),
            None => Content::LocalizationKey(raw.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Content {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Content::parse(&raw))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Input {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub next_step: String,
    #[serde(default)]
    pub validation: String,
}

impl Input {
    pub fn is_catch_all(&self) -> bool {
        self.input.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    pub id: String,
    pub content: Content,
    #[serde(default)]
    pub allow_back: bool,
    #[serde(default)]
    pub is_end_session: bool,
    #[serde(default)]
    pub validation: String,
    #[serde(default)]
    pub inputs: Vec<Input>,
}

impl Step {
    /// First literal match wins; otherwise the first catch-all (empty
    /// `input`) entry; otherwise `None`.
    pub fn resolve_input(&self, user_input: &str) -> Option<&Input> {
        self.inputs
            .iter()
            .find(|i| !i.is_catch_all() && i.input == user_input)
            .or_else(|| self.inputs.iter().find(|i| i.is_catch_all()))
    }
}

#[derive(Debug, Deserialize)]
struct StepGraphFile {
    steps: Vec<Step>,
}

#[derive(Debug, Clone)]
pub struct StepGraph {
    steps: HashMap<String, Step>,
}

impl StepGraph {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let body = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading step graph {}: {e}", path.display()))?;
        Self::from_json(&body)
    }

    pub fn from_json(body: &str) -> anyhow::Result<Self> {
        let file: StepGraphFile = serde_json::from_str(body)?;
        let steps = file.steps.into_iter().map(|s| (s.id.clone(), s)).collect();
        Ok(StepGraph { steps })
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Step> {
        self.steps.get(id)
    }

    pub(crate) const HOME: &'static str = "home";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> &'static str {
        r#"{
            "steps": [
                { "id": "home", "content": "home_ussd", "inputs": [
                    { "input": "1", "next_step": "electricity_prompt" },
                    { "input": "2", "action": "set_language_rw", "next_step": "home" }
                ]},
                { "id": "electricity_prompt", "content": "electricity_recent_numbers:fn", "inputs": [
                    { "input": "", "next_step": "electricity_amount" }
                ]},
                { "id": "electricity_amount", "content": "ask_amount", "is_end_session": true, "inputs": [] }
            ]
        }"#
    }

    #[test]
    fn dynamic_content_marker_is_parsed() {
        let graph = StepGraph::from_json(sample()).unwrap();
        let step = graph.get("electricity_prompt").unwrap();
        assert_eq!(
            step.content,
            Content::DynamicAction("electricity_recent_numbers".to_string())
        );
    }

    #[test]
    fn plain_content_is_a_localization_key() {
        let graph = StepGraph::from_json(sample()).unwrap();
        let step = graph.get("home").unwrap();
        assert_eq!(step.content, Content::LocalizationKey("home_ussd".to_string()));
    }

    #[test]
    fn literal_match_wins_over_catch_all() {
        let graph = StepGraph::from_json(sample()).unwrap();
        let step = graph.get("home").unwrap();
        let matched = step.resolve_input("2").unwrap();
        assert_eq!(matched.action, "set_language_rw");
    }

    #[test]
    fn catch_all_used_when_no_literal_matches() {
        let graph = StepGraph::from_json(sample()).unwrap();
        let step = graph.get("electricity_prompt").unwrap();
        let matched = step.resolve_input("anything the user typed").unwrap();
        assert_eq!(matched.next_step, "electricity_amount");
    }

    #[test]
    fn no_match_and_no_catch_all_is_none() {
        let graph = StepGraph::from_json(sample()).unwrap();
        let step = graph.get("electricity_amount").unwrap();
        assert!(step.resolve_input("1").is_none());
    }
}

//! Relevance-based tool selection.
//!
//! When more tools are registered than a backend comfortably accepts, the
//! registry asks a ranker to pick the subset most likely to matter for the
//! user's message.  Ranking is a heuristic, not a guarantee: the fallback
//! ladder in the agent still recovers when a backend rejects the payload.

use std::collections::HashSet;

use crate::naming::parse_tool_name;
use crate::registry::LlmTool;

/// Orders the tool list by estimated relevance to one user message.
pub trait ToolRanker: Send + Sync {
    /// Return at most `max` tools, most relevant first.
    fn rank(&self, input: &str, tools: &[LlmTool], max: usize) -> Vec<LlmTool>;
}

/// Token-overlap ranker with verb priors and plugin-mention boosting.
///
/// Plugins the user names explicitly are always included before any
/// score-based backfill.
#[derive(Default)]
pub struct HeuristicRanker;

impl HeuristicRanker {
    pub fn new() -> Self {
        Self
    }
}

impl ToolRanker for HeuristicRanker {
    fn rank(&self, input: &str, tools: &[LlmTool], max: usize) -> Vec<LlmTool> {
        let input_lower = input.to_lowercase();
        let input_tokens = tokenize(&input_lower);

        let mut scored: Vec<(i64, &LlmTool)> = tools
            .iter()
            .map(|tool| (score_tool(&input_lower, &input_tokens, tool), tool))
            .collect();
        // Stable order for equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.name.cmp(&b.1.name)));

        let mentioned: HashSet<String> = tools
            .iter()
            .filter_map(|tool| parse_tool_name(&tool.name).ok())
            .map(|(plugin, _)| plugin)
            .filter(|plugin| input_lower.contains(plugin.as_str()))
            .collect();

        // Tools of explicitly-mentioned plugins first, then backfill by score.
        let mut selected: Vec<LlmTool> = Vec::with_capacity(max.min(tools.len()));
        for (_, tool) in &scored {
            if selected.len() >= max {
                break;
            }
            if let Ok((plugin, _)) = parse_tool_name(&tool.name) {
                if mentioned.contains(&plugin) {
                    selected.push((*tool).clone());
                }
            }
        }
        for (_, tool) in &scored {
            if selected.len() >= max {
                break;
            }
            if !selected.iter().any(|t| t.name == tool.name) {
                selected.push((*tool).clone());
            }
        }
        selected
    }
}

fn score_tool(input_lower: &str, input_tokens: &HashSet<String>, tool: &LlmTool) -> i64 {
    let (plugin, action) = match parse_tool_name(&tool.name) {
        Ok(pair) => pair,
        Err(_) => return 0,
    };

    let mut score = base_priority(&action);

    for token in tokenize(&action.to_lowercase()) {
        if matches_any(input_tokens, &token) {
            score += 8;
        }
    }
    for token in tokenize(&tool.description.to_lowercase()) {
        if matches_any(input_tokens, &token) {
            score += 3;
        }
    }

    if input_tokens.contains(&plugin) {
        score += 30;
    }
    // Literal encoded-name mentions happen when a user quotes a tool back.
    if input_lower.contains(&tool.name.to_lowercase()) {
        score += 20;
    }

    score
}

/// Verb prior: read-ish actions are asked for more often than destructive
/// ones, so they win ties.
fn base_priority(action: &str) -> i64 {
    let head = action.split(['_', '-']).next().unwrap_or(action);
    match head {
        "search" | "find" => 50,
        "list" => 40,
        "get" | "fetch" | "read" => 35,
        "create" | "add" | "start" | "send" => 30,
        "update" | "edit" | "save" | "set" => 25,
        "delete" | "remove" | "stop" => 20,
        _ => 10,
    }
}

const STOPWORDS: [&str; 24] = [
    "a", "an", "the", "is", "are", "was", "to", "of", "in", "on", "for", "and", "or", "with",
    "my", "me", "i", "you", "it", "this", "that", "do", "can", "please",
];

/// Lowercased word tokens with stopwords removed and a naive plural strip.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(|t| {
            if t.len() > 3 && t.ends_with('s') {
                t[..t.len() - 1].to_owned()
            } else {
                t.to_owned()
            }
        })
        .collect()
}

/// Small table of interchangeable words that show up constantly in
/// tool-calling prompts.
const SYNONYMS: [&[&str]; 4] = [
    &["song", "track", "music", "playlist"],
    &["mail", "email", "message", "inbox"],
    &["event", "meeting", "calendar", "appointment"],
    &["task", "todo", "item"],
];

fn matches_any(input_tokens: &HashSet<String>, token: &str) -> bool {
    if input_tokens.contains(token) {
        return true;
    }
    SYNONYMS.iter().any(|group| {
        group.contains(&token) && group.iter().any(|syn| input_tokens.contains(*syn))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, description: &str) -> LlmTool {
        LlmTool {
            name: name.into(),
            description: description.into(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    fn fixture() -> Vec<LlmTool> {
        vec![
            tool("spotify__search_tracks", "Search for tracks by name"),
            tool("spotify__pause_playback", "Pause the current playback"),
            tool("mail__send", "Send an email message"),
            tool("mail__list_messages", "List messages in the inbox"),
            tool("calendar__create_event", "Create a calendar event"),
        ]
    }

    #[test]
    fn action_token_overlap_wins() {
        let ranker = HeuristicRanker::new();
        let out = ranker.rank("search for some tracks", &fixture(), 2);
        assert_eq!(out[0].name, "spotify__search_tracks");
    }

    #[test]
    fn synonyms_bridge_vocabulary() {
        let ranker = HeuristicRanker::new();
        let out = ranker.rank("play a song for me", &fixture(), 2);
        assert!(out.iter().any(|t| t.name.starts_with("spotify__")));
    }

    #[test]
    fn mentioned_plugin_is_always_included() {
        let ranker = HeuristicRanker::new();
        let out = ranker.rank("use calendar to do something", &fixture(), 2);
        assert!(out.iter().any(|t| t.name == "calendar__create_event"));
    }

    #[test]
    fn respects_max() {
        let ranker = HeuristicRanker::new();
        let out = ranker.rank("list my emails", &fixture(), 3);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn returns_all_when_max_exceeds_pool() {
        let ranker = HeuristicRanker::new();
        let out = ranker.rank("anything", &fixture(), 50);
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn quoted_tool_name_is_boosted() {
        let ranker = HeuristicRanker::new();
        let out = ranker.rank("retry mail__list_messages for me", &fixture(), 1);
        assert_eq!(out[0].name, "mail__list_messages");
    }

    #[test]
    fn ties_break_by_name() {
        let ranker = HeuristicRanker::new();
        let tools = vec![tool("b__get_x", "same"), tool("a__get_x", "same")];
        let out = ranker.rank("unrelated", &tools, 2);
        assert_eq!(out[0].name, "a__get_x");
    }
}

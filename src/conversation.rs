//! Conversation context analysis.
//!
//! Heuristics over recent chat history that help a provider answer
//! follow-up questions: which concepts were discussed, what the last
//! substantial answer was about, and whether the new prompt refers back to
//! it. The HTTP layer applies this to requests that carry `history` but no
//! precomputed `contextualHistory`; the router itself treats the result as
//! opaque context.
//!
//! All matching is on lowercase whole words, so `"API"` and `"api,"` both
//! count as the concept `api` while `"rapid"` does not.

use serde::Serialize;
use serde_json::Value;

use crate::types::{Message, RequestContext, Role};

/// Number of trailing messages considered.
pub const HISTORY_WINDOW: usize = 10;

/// Vocabulary for [`extract_concepts`].
const CONCEPTS: &[&str] = &[
    "api",
    "interface",
    "service",
    "endpoint",
    "request",
    "response",
    "flow",
    "process",
    "diagram",
    "flowchart",
    "architecture",
    "data",
    "model",
    "schema",
    "structure",
];

/// Vocabulary for the per-message concept chain.
const CHAIN_CONCEPTS: &[&str] = &[
    "api",
    "interface",
    "flowchart",
    "diagram",
    "architecture",
    "process",
    "system",
    "application",
];

const VISUAL_WORDS: &[&str] = &["diagram", "flowchart", "chart", "graph", "visualization"];
const REFERENCE_WORDS: &[&str] = &["it", "this", "that", "these", "those"];
const QUESTION_WORDS: &[&str] = &["how", "why", "what", "when", "where"];
const CLARIFY_WORDS: &[&str] = &["explain", "elaborate", "clarify"];
const FOLLOW_UP_MARKERS: &[&str] = &[
    "flowchart", "diagram", "explain", "how", "why", "it", "this", "that",
];

/// Prompts shorter than this are treated as follow-ups.
const SHORT_PROMPT: usize = 20;
/// Minimum length of an answer that counts as a discussion.
const DISCUSSION_MIN: usize = 100;
/// Minimum length of an answer whose first line names the topic.
const TOPIC_MIN: usize = 50;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lowercase words with their byte offsets.
fn words(text: &str) -> Vec<(usize, String)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (is_word_char(c), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push((s, text[s..i].to_lowercase()));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, text[s..].to_lowercase()));
    }
    out
}

fn has_any(text: &str, vocabulary: &[&str]) -> bool {
    words(text).into_iter().any(|(_, w)| vocabulary.contains(&w.as_str()))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Distinct vocabulary words in `text`, in order of first appearance.
fn collect_vocabulary(text: &str, vocabulary: &[&str]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for (_, word) in words(text) {
        if vocabulary.contains(&word.as_str()) && !found.contains(&word) {
            found.push(word);
        }
    }
    found
}

/// Technical concepts mentioned in a text.
pub fn extract_concepts(text: &str) -> Vec<String> {
    collect_vocabulary(text, CONCEPTS)
}

/// Whether a prompt asks for a visual answer.
pub fn needs_visual_response(prompt: &str) -> bool {
    has_any(prompt, VISUAL_WORDS)
}

/// Whether `prompt` reads as a follow-up to `previous`.
///
/// Without a previous answer nothing is a follow-up. Otherwise any of:
/// a back-reference ("it", "that"), a question word followed by `?`,
/// "can/could you", a request to explain, a short prompt, or a shared
/// concept.
pub fn is_follow_up(prompt: &str, previous: Option<&str>) -> bool {
    let Some(previous) = previous else {
        return false;
    };

    let tokens = words(prompt);
    let question = tokens
        .iter()
        .find(|(_, w)| QUESTION_WORDS.contains(&w.as_str()))
        .is_some_and(|(offset, _)| prompt[*offset..].contains('?'));
    let polite = tokens.windows(2).any(|pair| {
        matches!(pair[0].1.as_str(), "can" | "could") && pair[1].1 == "you"
    });
    let referential = tokens
        .iter()
        .any(|(_, w)| REFERENCE_WORDS.contains(&w.as_str()) || CLARIFY_WORDS.contains(&w.as_str()));

    referential
        || question
        || polite
        || char_len(prompt) < SHORT_PROMPT
        || shares_concept(prompt, previous)
}

fn shares_concept(prompt: &str, previous: &str) -> bool {
    let previous = extract_concepts(previous);
    extract_concepts(prompt)
        .iter()
        .any(|concept| previous.contains(concept))
}

/// Concepts and candidate topic sentences of one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageContext {
    pub role: Role,
    pub content: String,
    pub concepts: Vec<String>,
    pub topics: Vec<String>,
}

impl MessageContext {
    fn from_message(message: &Message) -> Self {
        let mut topics: Vec<String> = Vec::new();
        for line in message.content.lines() {
            if char_len(line) <= TOPIC_MIN {
                continue;
            }
            let sentence = line.split('.').next().unwrap_or_default();
            if !sentence.is_empty() && !topics.iter().any(|t| t == sentence) {
                topics.push(sentence.to_string());
            }
        }
        Self {
            role: message.role,
            content: message.content.clone(),
            concepts: collect_vocabulary(&message.content, CHAIN_CONCEPTS),
            topics,
        }
    }
}

/// Summary of where the conversation stands.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextualHistory {
    /// First line of the latest substantial assistant answer.
    pub main_topic: String,
    /// Full text of the latest long assistant answer.
    pub last_discussion: String,
    pub is_follow_up: bool,
    /// Last three topic sentences across the window.
    pub recent_topics: Vec<String>,
    pub concept_chain: Vec<String>,
}

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationAnalysis {
    /// The analysed window of history.
    pub history: Vec<Message>,
    pub contextual_history: ContextualHistory,
    pub conversation_context: Vec<MessageContext>,
    /// Content of the most recent message, or empty.
    pub last_query: String,
    pub requires_flowchart: bool,
    /// Concepts of the last discussion.
    pub main_concepts: Vec<String>,
    /// Finer-grained follow-up test against the last discussion.
    pub is_follow_up_question: bool,
    pub requires_visual_response: bool,
}

/// Analyse `prompt` against the trailing [`HISTORY_WINDOW`] messages.
pub fn analyze(prompt: &str, history: &[Message]) -> ConversationAnalysis {
    let window = &history[history.len().saturating_sub(HISTORY_WINDOW)..];
    let answers = || window.iter().filter(|m| m.role == Role::Assistant);

    let last_discussion = answers()
        .filter(|m| char_len(&m.content) > DISCUSSION_MIN)
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default();
    let main_topic = answers()
        .filter(|m| char_len(&m.content) > TOPIC_MIN)
        .last()
        .and_then(|m| m.content.lines().next())
        .unwrap_or_default()
        .to_string();

    let conversation_context: Vec<MessageContext> =
        window.iter().map(MessageContext::from_message).collect();
    let all_topics: Vec<String> = conversation_context
        .iter()
        .flat_map(|c| c.topics.iter().cloned())
        .collect();
    let recent_topics = all_topics[all_topics.len().saturating_sub(3)..].to_vec();
    let concept_chain = conversation_context
        .iter()
        .flat_map(|c| c.concepts.iter().cloned())
        .collect();

    let follow_up = has_any(prompt, FOLLOW_UP_MARKERS) || char_len(prompt) < SHORT_PROMPT;
    let requires_flowchart =
        prompt.to_lowercase().contains("flowchart") || (follow_up && !last_discussion.is_empty());

    let previous = (!last_discussion.is_empty()).then_some(last_discussion.as_str());
    let is_follow_up_question = is_follow_up(prompt, previous);
    let main_concepts = extract_concepts(&last_discussion);

    ConversationAnalysis {
        history: window.to_vec(),
        last_query: history.last().map(|m| m.content.clone()).unwrap_or_default(),
        contextual_history: ContextualHistory {
            main_topic,
            last_discussion,
            is_follow_up: follow_up,
            recent_topics,
            concept_chain,
        },
        conversation_context,
        requires_flowchart,
        main_concepts,
        is_follow_up_question,
        requires_visual_response: needs_visual_response(prompt),
    }
}

impl ConversationAnalysis {
    /// Write the analysis into a request context.
    ///
    /// `history` is trimmed to the analysed window; `contextualHistory`,
    /// `conversationContext`, `lastQuery` and `requiresFlowchart` are set.
    pub fn apply(&self, context: &mut RequestContext) {
        context.insert("history", to_value(&self.history));
        context.insert("contextualHistory", to_value(&self.contextual_history));
        context.insert("conversationContext", to_value(&self.conversation_context));
        context.insert("lastQuery", self.last_query.clone());
        context.insert("requiresFlowchart", self.requires_flowchart);
    }
}

fn to_value<T: Serialize>(value: &T) -> Value {
    // Plain data with string keys always serializes.
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Enrich a request context in place when it has history but no analysis.
///
/// Returns whether anything was added.
pub fn enrich_context(prompt: &str, context: &mut RequestContext) -> bool {
    if context.contains_key("contextualHistory") {
        return false;
    }
    let history = context.history();
    if history.is_empty() {
        return false;
    }
    analyze(prompt, &history).apply(context);
    true
}

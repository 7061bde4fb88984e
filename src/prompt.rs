//! Prompt construction shared by all chat adapters.
//!
//! System prompts are a fixed lookup on task type. The user turn is
//! enhanced from context: code snippets are inlined, and diagram requests
//! are rewritten to refer back to the conversation they follow.

use crate::types::{Message, ModelRequest, ModelType, Role, TaskType};

const GENERAL_SYSTEM_PROMPT: &str = "You are a versatile AI assistant that can help with coding, text analysis, explanations, and general questions. Respond in a helpful, accurate, and concise manner. For code, include explanations of what the code does.";

const CODE_SYSTEM_PREFIX: &str =
    "You are a code-specialized AI assistant that excels at programming tasks. ";

const CODE_COMPLETION_INSTRUCTIONS: &str = "Complete the code snippet with the most logical continuation. Focus on correctness and best practices. Make sure to handle edge cases and provide efficient solutions.";

const CODE_GENERATION_INSTRUCTIONS: &str = "Generate well-structured, efficient code based on the requirements. Include helpful comments to explain key parts and make the code easily understandable.";

const CODE_EXPLANATION_INSTRUCTIONS: &str = "Explain the provided code clearly, focusing on its purpose, algorithm, and any important concepts. Break down complex parts into simple explanations.";

const CODE_GENERAL_INSTRUCTIONS: &str = "Provide helpful coding assistance based on the user's request. Focus on delivering practical, working solutions with explanations.";

/// System prompt for a request class and task.
pub fn system_prompt(model_type: ModelType, task: TaskType) -> String {
    let instructions = match task {
        TaskType::CodeCompletion => CODE_COMPLETION_INSTRUCTIONS,
        TaskType::CodeGeneration => CODE_GENERATION_INSTRUCTIONS,
        TaskType::CodeExplanation => CODE_EXPLANATION_INSTRUCTIONS,
        TaskType::General if model_type == ModelType::Code => CODE_GENERAL_INSTRUCTIONS,
        TaskType::General => return GENERAL_SYSTEM_PROMPT.to_string(),
    };
    format!("{CODE_SYSTEM_PREFIX}{instructions}")
}

/// Task-specific framing of a raw prompt.
///
/// `General` prompts pass through unchanged. Completion and explanation
/// tasks put `code`, when given, between the instruction and the prompt.
pub fn format_prompt(task: TaskType, prompt: &str, code: Option<&str>) -> String {
    let framed = |header: &str| match code {
        Some(code) => format!("{header}\n\n{code}\n\n{prompt}"),
        None => format!("{header}\n\n{prompt}"),
    };
    match task {
        TaskType::CodeCompletion => framed("Complete the following code:"),
        TaskType::CodeGeneration => {
            format!("Generate code for the following requirement:\n\n{prompt}")
        }
        TaskType::CodeExplanation => framed("Explain the following code:"),
        TaskType::General => prompt.to_string(),
    }
}

/// Whether a prompt asks for a diagram.
pub fn wants_diagram(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    lower.contains("flowchart") || lower.contains("diagram")
}

/// System prompt plus the ordered conversation to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    /// Prior user/assistant turns followed by the enhanced user turn.
    pub messages: Vec<Message>,
}

impl Prompt {
    /// The final user turn.
    pub fn user_text(&self) -> &str {
        self.messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }
}

/// Build the provider-neutral prompt for a request.
pub fn build_prompt(request: &ModelRequest) -> Prompt {
    let context = request.context.as_ref();
    let history: Vec<Message> = context
        .map(|c| c.history())
        .unwrap_or_default()
        .into_iter()
        .filter(|m| m.role != Role::System)
        .collect();

    let task = request.task_type();
    let code = context.and_then(|c| c.code());
    let user = if wants_diagram(&request.prompt) && !history.is_empty() {
        diagram_prompt(&history)
    } else {
        match (task, code) {
            (TaskType::CodeCompletion | TaskType::CodeExplanation, Some(code)) => {
                format_prompt(task, &request.prompt, Some(code))
            }
            (_, Some(code)) => {
                format!("Code context:\n```\n{code}\n```\n\nRequest: {}", request.prompt)
            }
            (_, None) => format_prompt(task, &request.prompt, None),
        }
    };

    let mut messages = history;
    messages.push(Message::user(user));

    Prompt {
        system: system_prompt(request.model_type, task),
        messages,
    }
}

/// Rewrite a diagram request to illustrate the last discussed topic.
fn diagram_prompt(history: &[Message]) -> String {
    let previous = history
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let last_topic = previous
        .lines()
        .filter(|line| !wants_diagram(line))
        .filter(|line| !line.trim().is_empty())
        .last()
        .unwrap_or_default();

    format!(
        "Based on our previous discussion about \"{last_topic}\", create a Mermaid diagram that illustrates this concept. For context, here was our conversation:\n\n{previous}\n\nCreate a detailed Mermaid flowchart diagram about this topic using this format:\n```mermaid\nflowchart TD\n    %% Create a detailed flowchart about the previously discussed topic\n```"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestContext;
    use serde_json::json;

    #[test]
    fn system_prompt_is_keyed_by_task() {
        let completion = system_prompt(ModelType::Code, TaskType::CodeCompletion);
        assert!(completion.starts_with(CODE_SYSTEM_PREFIX));
        assert!(completion.contains("logical continuation"));

        let generation = system_prompt(ModelType::Primary, TaskType::CodeGeneration);
        assert!(generation.contains("helpful comments"));

        let explanation = system_prompt(ModelType::Code, TaskType::CodeExplanation);
        assert!(explanation.contains("Break down"));

        assert_eq!(
            system_prompt(ModelType::Primary, TaskType::General),
            GENERAL_SYSTEM_PROMPT
        );
        assert!(system_prompt(ModelType::Code, TaskType::General).contains("coding assistance"));
    }

    #[test]
    fn code_context_is_inlined() {
        let request = ModelRequest::new("why does this panic?")
            .context(RequestContext::new().with("code", "let x: u8 = 256;"));
        let prompt = build_prompt(&request);
        assert_eq!(prompt.messages.len(), 1);
        assert_eq!(
            prompt.user_text(),
            "Code context:\n```\nlet x: u8 = 256;\n```\n\nRequest: why does this panic?"
        );
    }

    #[test]
    fn history_precedes_user_turn() {
        let context: RequestContext = serde_json::from_value(json!({
            "history": [
                {"role": "system", "content": "Error: offline"},
                {"role": "user", "content": "what is REST?"},
                {"role": "assistant", "content": "REST is an architectural style."}
            ]
        }))
        .unwrap();
        let prompt = build_prompt(&ModelRequest::new("and GraphQL?").context(context));
        let roles: Vec<Role> = prompt.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(prompt.user_text(), "and GraphQL?");
    }

    #[test]
    fn diagram_request_refers_to_last_topic() {
        let context: RequestContext = serde_json::from_value(json!({
            "history": [
                {"role": "user", "content": "How does OAuth work?"},
                {"role": "assistant", "content": "OAuth delegates authorization.\nTokens are issued by an auth server."}
            ]
        }))
        .unwrap();
        let prompt = build_prompt(&ModelRequest::new("Draw a flowchart of it").context(context));
        let user = prompt.user_text();
        assert!(user.contains("\"Tokens are issued by an auth server.\""));
        assert!(user.contains("```mermaid"));
        assert!(user.contains("How does OAuth work?"));
    }

    #[test]
    fn diagram_without_history_is_left_alone() {
        let prompt = build_prompt(&ModelRequest::new("draw a diagram of a CPU"));
        assert_eq!(prompt.user_text(), "draw a diagram of a CPU");
    }

    #[test]
    fn format_prompt_templates() {
        assert_eq!(
            format_prompt(TaskType::CodeGeneration, "a parser", None),
            "Generate code for the following requirement:\n\na parser"
        );
        assert_eq!(
            format_prompt(TaskType::CodeCompletion, "finish it", Some("fn a(")),
            "Complete the following code:\n\nfn a(\n\nfinish it"
        );
        assert_eq!(format_prompt(TaskType::General, "hi", Some("x")), "hi");
        assert_eq!(
            format_prompt(TaskType::CodeExplanation, "briefly", None),
            "Explain the following code:\n\nbriefly"
        );
    }

    #[test]
    fn task_type_frames_the_user_turn() {
        let generation = ModelRequest::new("a tokenizer")
            .context(RequestContext::new().with("taskType", "code_generation"));
        assert_eq!(
            build_prompt(&generation).user_text(),
            "Generate code for the following requirement:\n\na tokenizer"
        );

        let explanation = ModelRequest::new("what does it do?").context(
            RequestContext::new()
                .with("taskType", "code_explanation")
                .with("code", "x.iter().sum()"),
        );
        let prompt = build_prompt(&explanation);
        assert_eq!(
            prompt.user_text(),
            "Explain the following code:\n\nx.iter().sum()\n\nwhat does it do?"
        );
        assert!(prompt.system.contains("Break down"));
    }
}

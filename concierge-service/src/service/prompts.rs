//! Message construction for the two generation calls of a turn.
//!
//! Everything here is a pure function of its arguments: the caller passes in
//! the history, catalog summary and profile text it loaded for this turn.

use tracing::debug;

use crate::history::{HistoryEntry, Role};
use crate::ollama::ChatMessage;
use crate::tools::{ToolCall, ToolResult};

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("../../prompts/system.txt");
const FINAL_RESPONSE_PROMPT_TEMPLATE: &str = include_str!("../../prompts/final_response.txt");

fn fill_template(template: &str, product_type: &str, user_profile: &str) -> String {
    template
        .replace("{product_type}", product_type)
        .replace("{user_profile}", user_profile)
}

/// Tool-selection system prompt with the catalog appended
pub fn build_system_prompt(product_type: &str, user_profile: &str, catalog_summary: &str) -> String {
    format!(
        "{}\n\nHere's the current catalog of available {}:\n{}",
        fill_template(SYSTEM_PROMPT_TEMPLATE, product_type, user_profile).trim_end(),
        product_type,
        catalog_summary
    )
}

pub fn build_final_response_prompt(product_type: &str, user_profile: &str) -> String {
    fill_template(FINAL_RESPONSE_PROMPT_TEMPLATE, product_type, user_profile)
        .trim_end()
        .to_string()
}

/// Map persisted history onto chat roles
pub fn history_messages(history: &[HistoryEntry]) -> impl Iterator<Item = ChatMessage> + '_ {
    history.iter().map(|entry| match entry.role {
        Role::Human => ChatMessage::user(&entry.content),
        Role::Ai => ChatMessage::assistant(&entry.content),
    })
}

/// Messages for the first call: system, history, then this turn's input
pub fn build_model_messages(
    system_prompt: String,
    history: &[HistoryEntry],
    input: &[String],
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + input.len() + 1);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history_messages(history));
    messages.extend(input.iter().map(ChatMessage::user));

    debug!(
        history_len = history.len(),
        input_len = input.len(),
        "Built model messages"
    );
    messages
}

/// Messages for the closing call: system, history, then the tool context
pub fn build_final_messages(
    system_prompt: String,
    history: &[HistoryEntry],
    context: String,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history_messages(history));
    messages.push(ChatMessage::assistant(context));
    messages
}

/// History entry recording the model's decision to call tools
pub fn tool_calls_entry(calls: &[ToolCall]) -> String {
    let json = serde_json::to_string(calls).unwrap_or_else(|_| "[]".to_string());
    format!("Tool Calls: {}", json)
}

/// What the tool showed the user, and any marketing copy for the products involved
pub fn describe_tool_result(
    tool: &str,
    result: &ToolResult,
    product_type: &str,
) -> (String, String) {
    let mut marketing = String::new();
    let mut add_marketing = |name: &str, text: Option<&str>| {
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            marketing.push_str(&format!("\n\nMarketing Content for {}:\n{}", name, text));
        }
    };

    let description = match (tool, result) {
        ("product-details", ToolResult::Detail(detail)) => {
            let name = detail
                .product
                .row
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("the {} item", product_type));
            add_marketing(&name, detail.marketing_content.as_deref());
            format!("detailed information about {}", name)
        }
        ("product-details", _) => {
            format!("detailed information about the {} item", product_type)
        }
        ("product-comparison", ToolResult::Comparison(comparison)) => {
            let first = comparison
                .product1
                .product
                .row
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("first {} item", product_type));
            add_marketing(&first, comparison.product1.marketing_content.as_deref());

            let second = comparison
                .product2
                .product
                .row
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("second {} item", product_type));
            add_marketing(&second, comparison.product2.marketing_content.as_deref());

            format!("a comparison between {} and {}", first, second)
        }
        ("product-comparison", _) => format!(
            "a comparison between first {pt} item and second {pt} item",
            pt = product_type
        ),
        ("product-tiles", ToolResult::Tiles(tiles)) => format!(
            "a display of {} {} titled '{}'",
            tiles.products.len(),
            product_type,
            tiles.title
        ),
        ("product-tiles", _) => format!(
            "a display of 0 {pt} titled '{pt}'",
            pt = product_type
        ),
        _ => "some information using a tool".to_string(),
    };

    (description, marketing)
}

/// Assistant-role message handing the tool output to the closing call
pub fn build_tool_context(tool: &str, result: &ToolResult, product_type: &str) -> String {
    let (description, marketing) = describe_tool_result(tool, result, product_type);
    format!(
        "Context: I previously invoked a tool to show the user {}. The raw result of that tool call was: {}{}",
        description,
        result.to_json(),
        marketing
    )
}

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};
use tera::{Context as TeraContext, Tera};

use crate::languages::Language;
use crate::providers::ToolSpec;

pub const TOOL_NAME: &str = "deliver_menu_translation";

const SYSTEM_PROMPT_TEMPLATE: &str = include_str!("prompts/system_prompt.tera");

pub fn tool_spec(tool_name: &str) -> ToolSpec {
    let parameters = json!({
        "type": "object",
        "properties": {
            "lines": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Translated menu lines, one per input line"
            },
            "target_language": {"type": "string"}
        },
        "required": ["lines", "target_language"]
    });

    ToolSpec {
        name: tool_name.to_string(),
        description: "Return the translated menu lines.".to_string(),
        parameters,
    }
}

pub fn render_system_prompt(target: Language, line_count: usize, tool_name: &str) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("target_lang", target.code());
    context.insert("target_name", target.english_name());
    context.insert("line_count", &line_count);
    context.insert("tool_name", tool_name);
    Tera::one_off(SYSTEM_PROMPT_TEMPLATE, &context, false)
        .with_context(|| "failed to render system prompt")
}

/// Validates the tool arguments and returns the translated block.
pub fn parse_tool_args(value: Value, target: Language) -> Result<String> {
    let args: ToolArgs =
        serde_json::from_value(value).with_context(|| "malformed translation tool arguments")?;
    if !args.target_language.trim().eq_ignore_ascii_case(target.code()) {
        return Err(anyhow!(
            "tool response target_language mismatch (expected '{}', got '{}')",
            target.code(),
            args.target_language
        ));
    }
    let lines = args
        .lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();
    if lines.is_empty() {
        return Err(anyhow!("translation is empty"));
    }
    Ok(lines.join("\n"))
}

#[derive(Debug, Deserialize)]
struct ToolArgs {
    lines: Vec<String>,
    target_language: String,
}

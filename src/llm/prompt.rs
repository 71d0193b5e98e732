//! Prompt construction for LLM requests.
//!
//! Builds the system prompt an agent receives alongside the `execute_sql`
//! tool: role, tool rules, optional business notes, then the schema.

use crate::db::Schema;

/// System prompt template for the analytics agent.
const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a careful analytics engineer for SQLite.
Use only listed tables.

TOOL RULES:
- Query the database only through the execute_sql tool
- Send exactly one SELECT statement per call
- Statements without LIMIT or an aggregate are capped at {row_cap} rows
- If a call returns an error, read it and correct the statement
{notes}
{schema}"#;

/// Builds the system prompt with the schema and business notes injected.
pub fn build_system_prompt(schema: &Schema, notes: Option<&str>, row_cap: usize) -> String {
    let notes_text = match notes.map(str::trim).filter(|n| !n.is_empty()) {
        Some(notes) => format!("\nNOTES:\n{notes}\n"),
        None => String::new(),
    };

    SYSTEM_PROMPT_TEMPLATE
        .replace("{row_cap}", &row_cap.to_string())
        .replace("{notes}", &notes_text)
        .replace("{schema}", &schema.format_for_llm())
}

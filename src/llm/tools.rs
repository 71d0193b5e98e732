//! LLM tool definitions for function calling.
//!
//! The agent gets exactly one tool, `execute_sql`, which routes through the
//! guarded executor. Every outcome, including a rejection or a malformed
//! call, is returned as a tool result the model can read and react to.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::types::{ToolCall, ToolResult};
use crate::error::SqlGuardError;
use crate::query::GuardedExecutor;

/// Name of the guarded query tool.
pub const EXECUTE_SQL_TOOL: &str = "execute_sql";

/// Tool definition for LLM function calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Input parameters for the execute_sql tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryInput {
    pub sql: String,
}

/// Returns the execute_sql tool definition.
pub fn execute_sql_tool() -> ToolDefinition {
    ToolDefinition {
        name: EXECUTE_SQL_TOOL.to_string(),
        description: "Execute one read-only SELECT.".to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "sql": {
                    "type": "string",
                    "description": "A single read-only SELECT statement, bounded with LIMIT when returning many rows."
                }
            },
            "required": ["sql"]
        }),
    }
}

/// Returns the tool definitions available to the LLM.
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![execute_sql_tool()]
}

/// Runs a tool call and packages the outcome as a tool result.
pub async fn dispatch_tool_call(executor: &GuardedExecutor, call: &ToolCall) -> ToolResult {
    if call.name != EXECUTE_SQL_TOOL {
        warn!("Unknown tool requested: {}", call.name);
        return ToolResult::error(
            &call.id,
            error_json(&format!("unknown tool '{}'", call.name), None),
        );
    }

    let input: QueryInput = match serde_json::from_str(&call.arguments) {
        Ok(input) => input,
        Err(e) => {
            warn!("Malformed {} arguments: {e}", EXECUTE_SQL_TOOL);
            return ToolResult::error(
                &call.id,
                error_json(&format!("invalid arguments for {EXECUTE_SQL_TOOL}: {e}"), None),
            );
        }
    };

    debug!("Tool call {} running: {}", call.id, input.sql);
    match executor.execute(&input.sql).await {
        Ok(result) => ToolResult::success(&call.id, result.to_json().to_string()),
        Err(e) => ToolResult::error(&call.id, format_error_for_llm(&e)),
    }
}

/// Formats an error as the JSON body of a failed tool result.
///
/// Store diagnostics are passed through verbatim so the model can correct
/// its statement; rejections also carry their reason code.
pub fn format_error_for_llm(error: &SqlGuardError) -> String {
    match error {
        SqlGuardError::Policy(reason) => error_json(&reason.to_string(), Some(reason.code())),
        SqlGuardError::Query(message) => error_json(message, None),
        other => error_json(&other.to_string(), None),
    }
}

fn error_json(message: &str, reason: Option<&str>) -> String {
    let body = match reason {
        Some(reason) => serde_json::json!({ "error": message, "reason": reason }),
        None => serde_json::json!({ "error": message }),
    };
    body.to_string()
}

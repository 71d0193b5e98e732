//! LLM integration for sqlguard.
//!
//! The crate does not talk to a provider itself. It supplies the pieces an
//! agent loop needs: the `execute_sql` tool definition, dispatch of tool
//! calls through the guarded executor, and the system prompt.

pub mod prompt;
pub mod tools;
pub mod types;

pub use prompt::build_system_prompt;
pub use tools::{
    dispatch_tool_call, execute_sql_tool, format_error_for_llm, get_tool_definitions, QueryInput,
    ToolDefinition, EXECUTE_SQL_TOOL,
};
pub use types::{ToolCall, ToolResult};

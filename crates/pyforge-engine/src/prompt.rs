//! Prompt construction for the initial request and every repair round.
//!
//! Feedback prompts always restate the original request and file context so
//! the model never has to rely on conversation memory.

use pyforge_core::Issue;

/// System prompt sent with every model call.
pub const SYSTEM_PROMPT: &str = include_str!("prompts/system.md");

/// Stand-in for the failed code when the reply contained no code at all.
pub const NO_CODE_FAILED_CODE: &str = "N/A - No code was returned.";

/// Issue text sent back when the reply contained no code at all.
pub const NO_CODE_FEEDBACK: &str = "Your response did not contain a valid Python code block. \
Please provide ONLY a Python code block enclosed in ```python ... ```.";

pub fn build_initial(user_query: &str, file_context: &str) -> String {
    format!(
        "A user wants to generate a Python script. Here is their request and the content of the files they provided.\n\n\
         **USER'S REQUEST:**\n{user_query}\n\n\
         **FILE CONTEXT:**\n{file_context}\n\n\
         Based on the request and the file context, please generate the complete Python script."
    )
}

/// Repair prompt carrying the failed code and one line per issue.
pub fn build_feedback(
    user_query: &str,
    file_context: &str,
    failed_code: &str,
    issues: &[String],
) -> String {
    let issues = issues.join("\n- ");
    format!(
        "The Python code you previously generated for the request had issues.\n\n\
         **ORIGINAL USER'S REQUEST:**\n{user_query}\n\n\
         **ORIGINAL FILE CONTEXT:**\n{file_context}\n\n\
         **THE FAILED CODE YOU WROTE:**\n\
         ```python\n{failed_code}\n```\n\n\
         **ANALYSIS FOUND THESE ISSUES:**\n- {issues}\n\n\
         Please analyze the original request, the file context, and the errors. \
         Provide a new, corrected version of the complete Python script."
    )
}

/// Render issues the way the feedback prompt lists them.
pub fn issue_lines(issues: &[Issue]) -> Vec<String> {
    issues.iter().map(ToString::to_string).collect()
}

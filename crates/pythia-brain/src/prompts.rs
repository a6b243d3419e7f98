//! Personas and prompt templates
//!
//! A persona is picked by file extension and placed at the top of the
//! generate and refactor prompts. Extensions are given without the dot.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Persona used for extensions with no entry in the table.
pub const DEFAULT_PERSONA: &str = "You are a helpful AI assistant.";

const SEPARATOR: &str = "--------------------------------------------------";

static PERSONAS: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();

fn personas() -> &'static HashMap<&'static str, &'static str> {
    PERSONAS.get_or_init(|| {
        HashMap::from([
            ("py", "You are a Senior Python Engineer. Write clean, runnable code, including error handling where appropriate."),
            ("html", "You are a Frontend Developer. Write valid HTML5 with embedded CSS for a modern, responsive look."),
            ("css", "You are a UI Designer. Write clean, modular CSS rules."),
            ("js", "You are a JavaScript Expert. Write valid, modern ES6+ code."),
            ("json", "You are a Data Engineer. Output ONLY valid, strictly structured JSON data."),
            ("sql", "You are a Database Administrator. Write efficient, valid SQL queries."),
            ("md", "You are a Technical Writer. Use Markdown with clear headers, lists, and code blocks."),
            ("mermaid", "You are a Systems Architect. You specialize in visualizing logic."),
        ])
    })
}

/// Persona for `extension` (case-insensitive, leading dot optional).
pub fn persona_for(extension: &str) -> &'static str {
    let key = extension.trim_start_matches('.').to_lowercase();
    personas().get(key.as_str()).copied().unwrap_or(DEFAULT_PERSONA)
}

/// Prompt asking for the full content of a new file.
pub fn generate_prompt(filename: &str, extension: &str, context: &str) -> String {
    format!(
        "{persona}\n\
         {SEPARATOR}\n\
         CONTEXT (Background Information):\n\
         {context}\n\
         {SEPARATOR}\n\
         TASK: Write the code for a file named '{filename}'.\n\
         INSTRUCTIONS:\n\
         1. Use the variables/data from the CONTEXT above if relevant.\n\
         2. You MUST write valid {extension} code. Do NOT just copy the context text.\n\
         3. Example: If context says 'Port: 80', your Python code should be 'PORT = 80'.\n\
         4. Output ONLY the code. No markdown formatting (no ```).\n",
        persona = persona_for(extension),
    )
}

/// Prompt asking for a full rewrite of `current_content`.
pub fn refactor_prompt(
    filename: &str,
    extension: &str,
    current_content: &str,
    instruction: &str,
) -> String {
    format!(
        "{persona}\n\
         {SEPARATOR}\n\
         TASK: The user wants to modify the file '{filename}'.\n\
         1. Read the CURRENT CONTENT below.\n\
         2. Follow the USER INSTRUCTIONS at the bottom.\n\
         3. Rewrite the FULL file with the changes applied.\n\
         4. REMOVE the user's instruction line from the final output.\n\
         5. Output ONLY the code. No markdown.\n\
         {SEPARATOR}\n\
         CURRENT CONTENT:\n\
         {current_content}\n\
         {SEPARATOR}\n\
         USER INSTRUCTIONS:\n\
         {instruction}\n",
        persona = persona_for(extension),
    )
}

/// Prompt asking for a Mermaid diagram of `code`.
pub fn visualize_prompt(target_filename: &str, code: &str) -> String {
    format!(
        "{persona}\n\
         {SEPARATOR}\n\
         TASK: Analyze the code below and generate a Mermaid.js diagram.\n\
         INSTRUCTIONS:\n\
         1. Use 'graph TD' (Top-Down) for flowcharts.\n\
         2. IMPORTANT: Wrap ALL node text in double quotes to prevent syntax errors.\n   \
            - BAD:  A[Start (Init)]\n   \
            - GOOD: A[\"Start (Init)\"]\n\
         3. Keep it simple and high-level (show relationships, not every line of code).\n\
         4. Output ONLY the mermaid code. No markdown blocks.\n\
         {SEPARATOR}\n\
         CODE TO ANALYZE ({target_filename}):\n\
         {code}\n",
        persona = persona_for("mermaid"),
    )
}

/// Strip a surrounding markdown code fence from a model response.
///
/// Only a fence opening on the first line is removed, together with its
/// language tag and a closing fence at the end.
pub fn clean_text(text: &str) -> String {
    let trimmed = text.trim_start();
    if !trimmed.starts_with("```") {
        return text.to_string();
    }

    let body = match trimmed.split_once('\n') {
        Some((_, rest)) => rest,
        None => return String::new(),
    };

    let end = body.trim_end();
    match end.strip_suffix("```") {
        Some(inner) => inner.to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persona_lookup() {
        assert!(persona_for("py").contains("Senior Python Engineer"));
        assert!(persona_for(".html").contains("Frontend Developer"));
        assert!(persona_for("JSON").contains("Data Engineer"));
    }

    #[test]
    fn test_persona_fallback() {
        assert_eq!(persona_for("unknown_extension"), DEFAULT_PERSONA);
        assert_eq!(persona_for("txt"), DEFAULT_PERSONA);
        assert_eq!(persona_for(""), DEFAULT_PERSONA);
    }

    #[test]
    fn test_clean_text_strips_fence() {
        let raw = "```python\nprint('Hello')\n```";
        assert_eq!(clean_text(raw).trim(), "print('Hello')");
    }

    #[test]
    fn test_clean_text_unterminated_fence() {
        assert_eq!(clean_text("```js\nlet x = 1;\n"), "let x = 1;\n");
    }

    #[test]
    fn test_clean_text_leaves_plain_text() {
        let raw = "x = 1\n```\nnot a fence start";
        assert_eq!(clean_text(raw), raw);
    }

    #[test]
    fn test_generate_prompt_contents() {
        let prompt = generate_prompt("test_script.py", "py", "Context: None");
        assert!(prompt.starts_with("You are a Senior Python Engineer"));
        assert!(prompt.contains("TASK: Write the code for a file named 'test_script.py'."));
        assert!(prompt.contains("Context: None"));
        assert!(prompt.contains("valid py code"));
    }

    #[test]
    fn test_refactor_prompt_contents() {
        let prompt = refactor_prompt("a.sql", "sql", "SELECT 1;", "add a WHERE clause");
        assert!(prompt.contains("Database Administrator"));
        assert!(prompt.contains("CURRENT CONTENT:\nSELECT 1;"));
        assert!(prompt.trim_end().ends_with("add a WHERE clause"));
    }

    #[test]
    fn test_visualize_prompt_contents() {
        let prompt = visualize_prompt("app.py", "def main(): pass");
        assert!(prompt.contains("graph TD"));
        assert!(prompt.contains("A[\"Start (Init)\"]"));
        assert!(prompt.contains("CODE TO ANALYZE (app.py):\ndef main(): pass"));
    }
}

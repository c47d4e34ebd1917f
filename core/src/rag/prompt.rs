pub const FALLBACK_ANSWER: &str =
    "Based on the available information, I cannot provide a complete answer to this question.";

pub fn default_system_prompt() -> String {
    format!(
        "Answer the user's Question based on the following possibly relevant Context. Follow these rules:
1. Never use phrases like \"according to the context,\" \"as the context states,\" etc. Treat the Context as your own knowledge, not something you are referencing.
2. Give a clear, short, and accurate answer. Explain complex terms if needed.
3. If the answer to the question requires today's date, use the following tool: get_todays_date.
4. If the Context doesn't adequately address the Question, say: \"{FALLBACK_ANSWER}\" only, nothing else.

Remember, your purpose is to provide information based on the Context, not to offer original advice."
    )
}

/// Joins context and question, indenting every line by two spaces.
pub fn form_prompt(question: &str, context: &str) -> String {
    let combined = format!("Context:\n{context}\n\nUser Question:\n{question}");
    combined
        .lines()
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_indented() {
        let prompt = form_prompt("Is it amber?", "Color: amber\nSize: 10in");
        assert_eq!(
            prompt,
            "  Context:\n  Color: amber\n  Size: 10in\n  \n  User Question:\n  Is it amber?"
        );
    }

    #[test]
    fn system_prompt_names_tool_and_fallback() {
        let prompt = default_system_prompt();
        assert!(prompt.contains("get_todays_date"));
        assert!(prompt.contains(FALLBACK_ANSWER));
    }
}

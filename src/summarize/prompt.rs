// src/summarize/prompt.rs

pub const DEFAULT_LANGUAGE: &str = "English";

pub fn system_prompt(language: &str) -> String {
    format!(
        "You are a professional news summarization assistant. Summarize the article in {language} \
         in no more than 100 words. Keep key figures, names and outcomes. Neutral tone, no emojis. \
         Output only the summary."
    )
}

/// User turn. An empty body asks the model to work from the title alone.
pub fn user_prompt(title: &str, content: &str) -> String {
    if content.trim().is_empty() {
        format!("Title: {title}\n\nContent: (not available, summarize from the title)")
    } else {
        format!("Title: {title}\n\nContent: {content}")
    }
}

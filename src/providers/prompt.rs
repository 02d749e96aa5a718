//! Story prompt template and model-output decoding.
//!
//! Providers that talk to a general-purpose chat model use this pair: the
//! prompt asks for a JSON object `{"story": ..., "choices": [...]}`, and
//! [`parse_story_payload`] turns the model's reply into a [`Continuation`].

use serde::Deserialize;

use crate::types::{Continuation, GenerationRequest};
use crate::{HuginnError, Result};

/// Choices requested from the model per step.
pub const CHOICES_PER_STEP: usize = 3;

/// System prompt sent ahead of every story request.
pub const SYSTEM_PROMPT: &str = "You are a children's storyteller writing a choose-your-own-adventure \
story. Always answer with a single JSON object and nothing else.";

/// Build the user prompt for one continuation.
pub fn build_prompt(request: &GenerationRequest) -> String {
    let style = &request.style;
    if request.is_opening() {
        return format!(
            "Start a new {genre} story in the style of {author}.\n\n\
             Reading Level: {level}\n\n\
             Story idea: \"{choice}\"\n\n\
             Write an engaging opening paragraph (3-5 sentences) that sets the scene.\n\
             Then provide exactly {n} different choices for what happens next.\n\n\
             {format}",
            genre = style.genre,
            author = style.author_style,
            level = style.reading_level,
            choice = request.choice,
            n = CHOICES_PER_STEP,
            format = FORMAT_INSTRUCTIONS,
        );
    }

    format!(
        "Continue this {genre} story in the style of {author} based on the choice: \"{choice}\"\n\n\
         Reading Level: {level}\n\n\
         Previous story:\n{context}\n\n\
         Write the next paragraph (3-5 sentences) that follows from this choice.\n\
         Then provide exactly {n} new choices for what happens next.\n\n\
         {format}",
        genre = style.genre,
        author = style.author_style,
        choice = request.choice,
        level = style.reading_level,
        context = request.history.join("\n\n"),
        n = CHOICES_PER_STEP,
        format = FORMAT_INSTRUCTIONS,
    )
}

const FORMAT_INSTRUCTIONS: &str = "Format your response as JSON:\n\
{\n    \"story\": \"The story text here...\",\n    \"choices\": [\"Choice 1\", \"Choice 2\", \"Choice 3\"]\n}";

#[derive(Deserialize)]
struct StoryPayload {
    story: String,
    choices: Vec<String>,
}

/// Decode the model's reply into a continuation.
///
/// Accepts the object bare or wrapped in a Markdown code fence. Rejects
/// replies with an empty story or without at least one non-blank choice;
/// blank choices are dropped and the rest trimmed.
pub fn parse_story_payload(content: &str) -> Result<Continuation> {
    let body = strip_code_fence(content.trim());
    let payload: StoryPayload = serde_json::from_str(body)
        .map_err(|e| HuginnError::MalformedResponse(format!("story payload: {e}")))?;

    let text = payload.story.trim();
    if text.is_empty() {
        return Err(HuginnError::MalformedResponse("empty story text".into()));
    }

    let choices: Vec<String> = payload
        .choices
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect();
    if choices.is_empty() {
        return Err(HuginnError::MalformedResponse("no choices offered".into()));
    }

    Ok(Continuation::new(text, choices))
}

/// Strip a surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
fn strip_code_fence(content: &str) -> &str {
    let Some(rest) = content.strip_prefix("```") else {
        return content;
    };
    // Drop the info string ("json") up to the first newline.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::types::StyleParams;

    fn request(history: Vec<String>, choice: &str) -> GenerationRequest {
        GenerationRequest::new(
            history,
            choice,
            StyleParams::new("Fantasy", "Roald Dahl", "Early Reader"),
            Duration::from_secs(30),
        )
    }

    #[test]
    fn continuation_prompt_includes_history_choice_and_style() {
        let prompt = build_prompt(&request(
            vec!["The fox woke up.".into(), "It was snowing.".into()],
            "follow the tracks",
        ));
        assert!(
            prompt.contains("Continue this Fantasy story in the style of Roald Dahl")
        );
        assert!(prompt.contains("\"follow the tracks\""));
        assert!(prompt.contains("Reading Level: Early Reader"));
        assert!(prompt.contains("The fox woke up.\n\nIt was snowing."));
        assert!(prompt.contains("exactly 3 new choices"));
    }

    #[test]
    fn opening_prompt_has_no_previous_story() {
        let prompt = build_prompt(&request(vec![], "a fox who cannot sleep"));
        assert!(prompt.starts_with("Start a new Fantasy story"));
        assert!(!prompt.contains("Previous story"));
    }

    #[test]
    fn parses_bare_json() {
        let c = parse_story_payload(r#"{"story": "It rains.", "choices": ["a", "b", "c"]}"#)
            .unwrap();
        assert_eq!(c.text, "It rains.");
        assert_eq!(c.next_choices, vec!["a", "b", "c"]);
        assert!(c.usage.is_none());
    }

    #[test]
    fn parses_fenced_json() {
        let content = "```json\n{\"story\": \"It rains.\", \"choices\": [\"a\"]}\n```";
        let c = parse_story_payload(content).unwrap();
        assert_eq!(c.next_choices, vec!["a"]);
    }

    #[test]
    fn parses_fence_without_info_string() {
        let content = "```\n{\"story\": \"s\", \"choices\": [\"x\"]}\n```\n";
        assert!(parse_story_payload(content).is_ok());
    }

    #[test]
    fn blank_choices_are_dropped() {
        let c = parse_story_payload(r#"{"story": "s", "choices": [" a ", "", "  "]}"#).unwrap();
        assert_eq!(c.next_choices, vec!["a"]);
    }

    #[test]
    fn rejects_prose_reply() {
        let err = parse_story_payload("Once upon a time...").unwrap_err();
        assert!(matches!(err, HuginnError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_empty_story() {
        let err = parse_story_payload(r#"{"story": "  ", "choices": ["a"]}"#).unwrap_err();
        assert!(matches!(err, HuginnError::MalformedResponse(_)));
    }

    #[test]
    fn rejects_missing_choices() {
        assert!(parse_story_payload(r#"{"story": "s"}"#).is_err());
        assert!(
            parse_story_payload(r#"{"story": "s", "choices": []}"#).is_err()
        );
    }
}

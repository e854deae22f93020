//! Prompt text sent to the chat-completion model.

use shared::EpisodePreference;

pub const SYSTEM_PROMPT: &str = r#"
You are a system that transforms movies into episodic series.

### Workflow:
1. Retrieve the subtitles of the movie using the `download_subtitles` tool.
2. Based on the user input (either a desired number of episodes OR desired episode length in minutes):
   - Split the movie into episodes.
   - Each episode must preserve narrative flow and maintain the spirit of the original movie.
   - Ensure timestamps (start and end) exactly align with the subtitle timestamps.
   - Provide a meaningful title and a short synopsis for each episode.

### Output format (strict JSON):
{
  "movie": {
    "title": "string",
    "runtime": "HH:MM:SS",
    "original_synopsis": "string"
  },
  "episodes": [
    {
      "episode_number": 1,
      "title": "string",
      "start_time": "HH:MM:SS",
      "end_time": "HH:MM:SS",
      "synopsis": "string"
    },
    ...
  ]
}

### Rules:
- Do not include full subtitles or script text in the output.
- All times must be in HH:MM:SS format.
- The number or length of episodes must follow the user request exactly.
- Episode boundaries must feel natural, respecting the story's pacing.
- **CRITICAL: NO SPOILERS in synopsis** - Write episode and general synopses that describe the setup, tone, and themes without revealing plot twists, endings, or major story developments.
"#;

/// The user turn for a title and split preference
pub fn user_prompt(title: &str, preference: EpisodePreference) -> String {
    match preference {
        EpisodePreference::Episodes(count) => format!(
            "Split \"{}\" into {} episodes. each one at least 25 minutes long",
            title, count
        ),
        EpisodePreference::MinutesPerEpisode(minutes) => format!(
            "Split \"{}\" into episodes, each one is {} min long",
            title, minutes
        ),
        EpisodePreference::Unspecified => format!("Split \"{}\" into episodes", title),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt() {
        assert_eq!(
            user_prompt("Inception", EpisodePreference::Episodes(6)),
            "Split \"Inception\" into 6 episodes. each one at least 25 minutes long"
        );
        assert_eq!(
            user_prompt("Inception", EpisodePreference::MinutesPerEpisode(30)),
            "Split \"Inception\" into episodes, each one is 30 min long"
        );
        assert_eq!(
            user_prompt("Inception", EpisodePreference::Unspecified),
            "Split \"Inception\" into episodes"
        );
    }

    #[test]
    fn test_system_prompt_names_tool_and_shape() {
        assert!(SYSTEM_PROMPT.contains("download_subtitles"));
        assert!(SYSTEM_PROMPT.contains("\"episode_number\""));
        assert!(SYSTEM_PROMPT.contains("HH:MM:SS"));
    }
}

// src/prompt.rs
//! Deterministic prompt rendering: same instruction and content always yield the same text.

use crate::types::AcquiredContent;

pub const ANALYSIS_SUFFIX: &str =
    "Provide a comprehensive analysis that synthesizes all relevant information from the provided sources.";

const OUTPUT_FORMAT: &str = r#"Respond with exactly one JSON object in this format and nothing else:
{
  "title": "A clear, descriptive title for the report",
  "summary": "An executive summary of the key findings",
  "sections": [
    {
      "title": "Section title",
      "content": "Section content, citing sources as [Source N] where relevant"
    }
  ]
}
Use only information found in the sources below. Include at least one section."#;

/// Render the prompt from the user's instruction and every usable content block.
/// Blocks longer than `max_chars` are cut at a char boundary.
pub fn render(instruction: &str, contents: &[AcquiredContent], max_chars: usize) -> String {
    let mut out = String::new();
    out.push_str(instruction.trim().trim_end_matches('.'));
    out.push_str(". ");
    out.push_str(ANALYSIS_SUFFIX);
    out.push_str("\n\n");
    out.push_str(OUTPUT_FORMAT);
    out.push_str("\n\n");

    for (i, c) in contents.iter().filter(|c| c.is_usable()).enumerate() {
        out.push_str(&format!("[Source {}]: {}\n", i + 1, c.title));
        out.push_str(&format!("URL: {}\n", c.url));
        out.push_str("Content:\n");
        out.push_str(truncate_chars(c.content.trim(), max_chars));
        out.push_str("\n\n");
    }
    out.truncate(out.trim_end().len());
    out
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

//! Folding retrieved chunks into a single bounded context string.

use crate::chunk::CHARS_PER_TOKEN;
use crate::models::ScoredChunk;

const SEPARATOR: &str = "\n\n";

/// Build the context string for the system prompt.
///
/// Matches are ordered by descending score (ties keep retrieval order).
/// Each one is rendered as `source: <filename>` followed by its text, and
/// blocks are joined by a blank line. Whole blocks are added while they fit
/// in `budget_tokens × 4` characters; the first block that does not fit is
/// cut at a character boundary to fill the remaining budget, and nothing
/// after it is included.
pub fn assemble_context(matches: &[ScoredChunk], budget_tokens: usize) -> String {
    let budget = budget_tokens.saturating_mul(CHARS_PER_TOKEN);

    let mut ordered: Vec<&ScoredChunk> = matches.iter().collect();
    ordered.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = String::new();
    let mut used = 0usize;

    for m in ordered {
        let sep = if out.is_empty() { "" } else { SEPARATOR };
        let block = match m.filename() {
            Some(name) => format!("{}source: {}\n{}", sep, name, m.text),
            None => format!("{}{}", sep, m.text),
        };
        let len = block.chars().count();

        if used + len <= budget {
            out.push_str(&block);
            used += len;
            continue;
        }

        // Only cut when some text survives past the separator.
        let remaining = budget - used;
        if remaining > sep.len() {
            out.extend(block.chars().take(remaining));
        }
        break;
    }

    out
}

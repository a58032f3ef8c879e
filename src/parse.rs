//! Parsers for free-text generation responses.
//!
//! Both are pure and total: whatever the model returns, the caller gets a
//! usable value.

use crate::models::Faq;

/// Upper bound on parsed discussion questions.
pub const MAX_QUESTIONS: usize = 10;

pub const FAQ_FALLBACK_QUESTION: &str = "Could not generate specific FAQs";
pub const FAQ_FALLBACK_ANSWER: &str = "Please try again or check the document content.";

/// One question per non-blank line, with list markers removed.
///
/// Leading bullets (`-`, `*`, `•`) and enumerations (`1.`, `2)`) are
/// stripped. Lines that are empty after stripping are dropped. At most
/// [`MAX_QUESTIONS`] items are returned.
pub fn parse_questions(response: &str) -> Vec<String> {
    response
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .take(MAX_QUESTIONS)
        .map(String::from)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '•') || c.is_whitespace());

    let digits = line.len() - line.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(after) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return after.trim();
        }
    }
    line.trim()
}

/// Split a `Q: ... A: ...` transcript into pairs.
///
/// Pairs with an empty question or answer are discarded. When nothing usable
/// remains, a single sentinel pair is returned instead of an empty list.
pub fn parse_faqs(response: &str) -> Vec<Faq> {
    let faqs: Vec<Faq> = response
        .split("Q:")
        .filter_map(|block| {
            let mut parts = block.split("A:");
            let question = parts.next()?.trim();
            let answer = parts.next()?.trim();
            if question.is_empty() || answer.is_empty() {
                None
            } else {
                Some(Faq::new(question, answer))
            }
        })
        .collect();

    if faqs.is_empty() {
        tracing::warn!("No Q:/A: pairs found in FAQ response");
        return vec![Faq::new(FAQ_FALLBACK_QUESTION, FAQ_FALLBACK_ANSWER)];
    }
    faqs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_enumeration_and_bullets() {
        let response = "1. What is the main argument?\n\n- How does chapter two differ?\n2) Why now?\n  * Who benefits?\n• Where next?";
        assert_eq!(
            parse_questions(response),
            vec![
                "What is the main argument?",
                "How does chapter two differ?",
                "Why now?",
                "Who benefits?",
                "Where next?",
            ]
        );
    }

    #[test]
    fn seven_lines_give_seven_questions() {
        let response = (1..=7)
            .map(|i| format!("{}. Question {}?", i, i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let questions = parse_questions(&response);
        assert_eq!(questions.len(), 7);
        assert_eq!(questions[6], "Question 7?");
    }

    #[test]
    fn truncates_to_ten() {
        let response = (1..=14)
            .map(|i| format!("- Q{}", i))
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(parse_questions(&response).len(), MAX_QUESTIONS);
    }

    #[test]
    fn numbers_without_marker_are_kept() {
        assert_eq!(
            parse_questions("1984 is the setting; why?"),
            vec!["1984 is the setting; why?"]
        );
    }

    #[test]
    fn marker_only_lines_are_dropped() {
        assert!(parse_questions("-\n3.\n   \n*").is_empty());
    }

    #[test]
    fn canonical_transcript_yields_every_pair() {
        let transcript = "Q: What is it?\nA: A book.\n\nQ: Who wrote it?\nA:  An author. \nQ: When?\nA: Recently.";
        let faqs = parse_faqs(transcript);
        assert_eq!(
            faqs,
            vec![
                Faq::new("What is it?", "A book."),
                Faq::new("Who wrote it?", "An author."),
                Faq::new("When?", "Recently."),
            ]
        );
    }

    #[test]
    fn pairs_with_empty_side_are_dropped() {
        let faqs = parse_faqs("Q: Lonely question?\nQ:\nA: Orphan answer\nQ: Kept?\nA: Yes.");
        assert_eq!(faqs, vec![Faq::new("Kept?", "Yes.")]);
    }

    #[test]
    fn unparseable_response_gives_sentinel() {
        let faqs = parse_faqs("The model said something else entirely.");
        assert_eq!(
            faqs,
            vec![Faq::new(FAQ_FALLBACK_QUESTION, FAQ_FALLBACK_ANSWER)]
        );
    }
}

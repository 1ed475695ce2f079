use crate::config::{RetrievalConfig, DEFAULT_PROMPT_TEMPLATE};
use crate::models::ScoredPassage;

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Merges retrieved passages and the user question into one prompt.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: String,
    max_context_chars: usize,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            max_context_chars: RetrievalConfig::default().max_context_chars,
        }
    }
}

impl PromptAssembler {
    pub fn new(template: impl Into<String>, max_context_chars: usize) -> Self {
        Self {
            template: template.into(),
            max_context_chars,
        }
    }

    pub fn from_config(config: &RetrievalConfig) -> Self {
        Self::new(config.prompt_template.clone(), config.max_context_chars)
    }

    /// Passage contents in rank order, joined by [`CONTEXT_SEPARATOR`].
    ///
    /// Passages are appended while they fit in `max_context_chars`. The first
    /// passage is always present, cut to the budget when it alone overflows.
    pub fn build_context(&self, passages: &[ScoredPassage]) -> String {
        let separator_len = CONTEXT_SEPARATOR.chars().count();
        let mut context = String::new();
        let mut used = 0usize;

        for (position, passage) in passages.iter().enumerate() {
            let content = passage.content.trim();
            let len = content.chars().count();

            if position == 0 {
                if len > self.max_context_chars {
                    context.extend(content.chars().take(self.max_context_chars));
                    break;
                }
                context.push_str(content);
                used = len;
                continue;
            }

            if used + separator_len + len > self.max_context_chars {
                break;
            }
            context.push_str(CONTEXT_SEPARATOR);
            context.push_str(content);
            used += separator_len + len;
        }

        context
    }

    /// `None` when nothing was retrieved; callers answer without the model.
    pub fn assemble(&self, passages: &[ScoredPassage], question: &str) -> Option<String> {
        if passages.is_empty() {
            return None;
        }

        let context = self.build_context(passages);
        Some(fill_template(&self.template, &context, question.trim()))
    }
}

/// Substitutes placeholders in a single pass over the template. Inserted
/// values are never scanned again, so passages may contain `{question}`.
fn fill_template(template: &str, context: &str, question: &str) -> String {
    let placeholders = [("{context}", context), ("{question}", question)];
    let mut filled = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    loop {
        let next = placeholders
            .iter()
            .filter_map(|(placeholder, value)| {
                rest.find(placeholder).map(|at| (at, *placeholder, *value))
            })
            .min_by_key(|(at, _, _)| *at);

        let Some((at, placeholder, value)) = next else {
            filled.push_str(rest);
            return filled;
        };
        filled.push_str(&rest[..at]);
        filled.push_str(value);
        rest = &rest[at + placeholder.len()..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(content: &str, score: f32) -> ScoredPassage {
        ScoredPassage {
            id: format!("doc:0:{score}"),
            content: content.to_string(),
            source: "doc".to_string(),
            page_number: 0,
            score,
        }
    }

    #[test]
    fn passages_are_joined_with_separator() {
        let assembler = PromptAssembler::default();
        let context = assembler.build_context(&[passage("alpha", 0.9), passage("beta", 0.5)]);
        assert_eq!(context, "alpha\n\n---\n\nbeta");
    }

    #[test]
    fn prompt_contains_context_and_question() {
        let assembler = PromptAssembler::default();
        let prompt = assembler
            .assemble(&[passage("Water boils at 100 C.", 0.8)], "When does water boil?")
            .unwrap_or_default();

        assert!(prompt.contains("Water boils at 100 C."));
        assert!(prompt.contains("When does water boil?"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn placeholder_text_inside_passages_is_kept() {
        let assembler = PromptAssembler::new("Context: {context}\nQ: {question}", 500);
        let prompt = assembler
            .assemble(&[passage("Templates use {question} tokens.", 0.7)], "What is X?")
            .unwrap_or_default();

        assert_eq!(prompt, "Context: Templates use {question} tokens.\nQ: What is X?");
    }

    #[test]
    fn placeholder_text_inside_question_is_kept() {
        assert_eq!(
            fill_template("{question} | {context} | {question}", "ctx", "why {context}?"),
            "why {context}? | ctx | why {context}?"
        );
    }

    #[test]
    fn nothing_retrieved_means_no_prompt() {
        assert!(PromptAssembler::default().assemble(&[], "question").is_none());
    }

    #[test]
    fn context_stops_at_budget() {
        let assembler = PromptAssembler::new("{context}|{question}", 12);
        let context = assembler.build_context(&[
            passage("0123456789", 0.9),
            passage("too long to fit", 0.8),
        ]);
        assert_eq!(context, "0123456789");
    }

    #[test]
    fn oversized_first_passage_is_truncated() {
        let assembler = PromptAssembler::new("{context}|{question}", 4);
        let context = assembler.build_context(&[passage("abcdefgh", 0.9)]);
        assert_eq!(context, "abcd");
    }
}

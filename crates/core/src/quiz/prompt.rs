use crate::config::{DifficultyProfile, DifficultyTable, QuizConfig};
use crate::models::Difficulty;

/// Builds the quiz generation instruction sent to the language model.
#[derive(Debug, Clone)]
pub struct QuizPromptBuilder {
    max_material_chars: usize,
    difficulties: DifficultyTable,
}

impl Default for QuizPromptBuilder {
    fn default() -> Self {
        Self::from_config(&QuizConfig::default())
    }
}

impl QuizPromptBuilder {
    pub fn from_config(config: &QuizConfig) -> Self {
        Self {
            max_material_chars: config.max_material_chars,
            difficulties: config.difficulties.clone(),
        }
    }

    pub fn profile(&self, difficulty: Difficulty) -> &DifficultyProfile {
        self.difficulties.profile(difficulty)
    }

    /// First `max_material_chars` characters of the material, trimmed.
    pub fn truncate_material<'a>(&self, material: &'a str) -> &'a str {
        let material = material.trim();
        match material.char_indices().nth(self.max_material_chars) {
            Some((cut, _)) => &material[..cut],
            None => material,
        }
    }

    pub fn build(&self, material: &str, difficulty: Difficulty) -> String {
        let profile = self.profile(difficulty);
        let letters = answer_letters(profile.answer_count);
        let letter_list = letters
            .iter()
            .map(char::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let focus = if profile.style_hints.is_empty() {
            String::new()
        } else {
            format!("Focus the questions on: {}.\n", profile.style_hints.join(", "))
        };
        let answer_lines: String = letters
            .iter()
            .map(|letter| format!("{letter}. <answer text>\n"))
            .collect();

        format!(
            "You are a teacher writing a multiple-choice quiz from the study material below.\n\n\
             Write {count} {difficulty} questions.\n\
             {focus}\
             Every question has exactly {answers} answers labeled {letter_list}, and exactly one of them is correct.\n\
             Use this layout for every question, with one blank line between questions:\n\n\
             Question 1: <question text>\n\
             {answer_lines}\
             Correct answer: <letter>\n\n\
             Do not add headings, explanations or any text outside this layout.\n\n\
             Study material:\n\
             {material}",
            count = profile.question_count,
            answers = profile.answer_count,
            material = self.truncate_material(material),
        )
    }
}

fn answer_letters(count: usize) -> Vec<char> {
    ('A'..='Z').take(count).collect()
}

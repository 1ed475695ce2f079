//! Turns a model reply into validated questions.
//!
//! The reply is split into blank-line separated blocks. Each block is read
//! line by line through [`BlockState`]; blocks that do not yield a complete
//! question are dropped and logged, never raised.

use crate::error::ParseError;
use crate::models::{Answer, Difficulty, Question};
use std::fmt;
use tracing::{debug, warn};

/// Intermediate form of one block before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBlock {
    pub question: String,
    pub answers: Vec<(char, String)>,
    pub correct_letter: Option<char>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockState {
    AwaitingQuestion,
    CollectingAnswers,
    Marked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRejection {
    NotAQuestion(String),
    EmptyQuestion,
    AnswerCount { expected: usize, found: usize },
    MissingCorrectAnswer,
    UnmatchedCorrectLetter { letter: char, matches: usize },
}

impl fmt::Display for BlockRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockRejection::NotAQuestion(line) => write!(f, "block starts with '{line}'"),
            BlockRejection::EmptyQuestion => f.write_str("question text is empty"),
            BlockRejection::AnswerCount { expected, found } => {
                write!(f, "expected {expected} answers, found {found}")
            }
            BlockRejection::MissingCorrectAnswer => f.write_str("no correct answer line"),
            BlockRejection::UnmatchedCorrectLetter { letter, matches } => {
                write!(f, "correct letter {letter} matches {matches} answers")
            }
        }
    }
}

/// Groups non-blank lines; any whitespace-only line ends a block.
pub fn split_blocks(reply: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();

    for line in reply.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }

    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn strip_question_label(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("Question")?;
    let rest = rest.trim_start_matches(|c: char| c.is_ascii_digit() || c.is_whitespace());
    let rest = rest
        .strip_prefix([':', '.', ')', '-'])
        .unwrap_or(rest);
    Some(rest.trim())
}

fn correct_marker(line: &str) -> Option<Option<char>> {
    if !line.to_lowercase().starts_with("correct answer") {
        return None;
    }

    // The letter must stand alone: "B", "B.", "(b)" or "**B**", not "Both A and C".
    let letter = line.split_once(':').and_then(|(_, rest)| {
        let mut chars = rest
            .trim_start_matches(|c: char| !c.is_ascii_alphanumeric())
            .chars();
        let letter = chars.next().filter(char::is_ascii_alphabetic)?;
        let stands_alone = chars.next().map_or(true, |next| !next.is_alphanumeric());
        stands_alone.then(|| letter.to_ascii_uppercase())
    });
    Some(letter)
}

fn answer_line(line: &str) -> Option<(char, String)> {
    let mut chars = line.chars();
    let letter = chars.next().filter(char::is_ascii_alphabetic)?;
    if chars.next() != Some('.') {
        return None;
    }
    Some((letter.to_ascii_uppercase(), chars.as_str().trim().to_string()))
}

pub fn parse_block(lines: &[&str]) -> Result<ParsedBlock, BlockRejection> {
    let mut state = BlockState::AwaitingQuestion;
    let mut block = ParsedBlock {
        question: String::new(),
        answers: Vec::new(),
        correct_letter: None,
    };

    for line in lines {
        state = match state {
            BlockState::AwaitingQuestion => {
                let question = strip_question_label(line)
                    .ok_or_else(|| BlockRejection::NotAQuestion(line.to_string()))?;
                block.question = question.to_string();
                BlockState::CollectingAnswers
            }
            BlockState::CollectingAnswers | BlockState::Marked => {
                if let Some(letter) = correct_marker(line) {
                    match (state, letter) {
                        (BlockState::Marked, _) => {
                            debug!(line, "ignoring repeated correct answer line");
                            state
                        }
                        (_, Some(letter)) => {
                            block.correct_letter = Some(letter);
                            BlockState::Marked
                        }
                        (_, None) => {
                            debug!(line, "correct answer line without a usable letter");
                            state
                        }
                    }
                } else {
                    if let Some(answer) = answer_line(line) {
                        block.answers.push(answer);
                    }
                    state
                }
            }
        };
    }

    if state == BlockState::AwaitingQuestion {
        return Err(BlockRejection::EmptyQuestion);
    }
    Ok(block)
}

pub fn validate_block(
    block: ParsedBlock,
    expected_answers: usize,
    difficulty: Difficulty,
) -> Result<Question, BlockRejection> {
    if block.question.is_empty() {
        return Err(BlockRejection::EmptyQuestion);
    }
    if block.answers.len() != expected_answers {
        return Err(BlockRejection::AnswerCount {
            expected: expected_answers,
            found: block.answers.len(),
        });
    }
    let letter = block
        .correct_letter
        .ok_or(BlockRejection::MissingCorrectAnswer)?;

    let matches = block
        .answers
        .iter()
        .filter(|(candidate, _)| *candidate == letter)
        .count();
    if matches != 1 {
        return Err(BlockRejection::UnmatchedCorrectLetter { letter, matches });
    }

    Ok(Question {
        text: block.question,
        difficulty,
        answers: block
            .answers
            .into_iter()
            .map(|(candidate, text)| Answer {
                text,
                is_correct: candidate == letter,
            })
            .collect(),
    })
}

/// Valid questions in reply order, or an error when none survived.
pub fn parse_quiz(
    reply: &str,
    difficulty: Difficulty,
    expected_answers: usize,
) -> Result<Vec<Question>, ParseError> {
    let blocks = split_blocks(reply);
    let mut questions = Vec::new();
    let mut rejected = 0usize;

    for (position, lines) in blocks.iter().enumerate() {
        let outcome = parse_block(lines)
            .and_then(|block| validate_block(block, expected_answers, difficulty));

        match outcome {
            Ok(question) => questions.push(question),
            Err(reason) => {
                rejected += 1;
                warn!(block = position, %reason, "dropping quiz block");
            }
        }
    }

    if questions.is_empty() {
        return Err(ParseError::NoValidQuestions { blocks: rejected });
    }
    Ok(questions)
}

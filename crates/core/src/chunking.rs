use crate::config::ChunkingConfig;
use crate::models::{Document, TextSegment};
use std::collections::VecDeque;

/// Tried in order; the first one present in the text wins.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits every page of every document, preserving document and page order.
pub fn split_documents(documents: &[Document], config: ChunkingConfig) -> Vec<TextSegment> {
    let mut segments = Vec::new();

    for document in documents {
        for page in &document.pages {
            for content in split_text(&page.text, config) {
                segments.push(TextSegment {
                    source: document.source.clone(),
                    page_number: page.number,
                    content,
                });
            }
        }
    }

    segments
}

/// Character-budget splitter. Pieces are cut on the coarsest separator that
/// occurs in the text and re-merged into windows of at most `chunk_size`
/// characters, carrying up to `chunk_overlap` characters into the next window.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_recursive(text, &SEPARATORS, config)
}

fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (position, separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator) {
            return (*separator, &separators[position + 1..]);
        }
    }
    ("", &[])
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let (separator, finer) = pick_separator(text, separators);

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut fitting: Vec<String> = Vec::new();

    for piece in pieces {
        if char_len(&piece) < config.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_pieces(&fitting, separator, config));
            fitting.clear();
        }

        if finer.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        } else {
            chunks.extend(split_recursive(&piece, finer, config));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_pieces(&fitting, separator, config));
    }

    chunks
}

fn merge_pieces(pieces: &[String], separator: &str, config: ChunkingConfig) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut merged = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        let joint = if window.is_empty() { 0 } else { separator_len };

        if total + len + joint > config.chunk_size && !window.is_empty() {
            push_joined(&window, separator, &mut merged);

            loop {
                let joint = if window.is_empty() { 0 } else { separator_len };
                let over_overlap = total > config.chunk_overlap;
                let over_budget = total > 0 && total + len + joint > config.chunk_size;
                if !(over_overlap || over_budget) {
                    break;
                }
                let Some(front) = window.pop_front() else {
                    total = 0;
                    break;
                };
                let joint = if window.is_empty() { 0 } else { separator_len };
                total = total.saturating_sub(char_len(front) + joint);
            }
        }

        window.push_back(piece);
        total += len + if window.len() > 1 { separator_len } else { 0 };
    }

    push_joined(&window, separator, &mut merged);
    merged
}

fn push_joined(window: &VecDeque<&str>, separator: &str, merged: &mut Vec<String>) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        merged.push(trimmed.to_string());
    }
}

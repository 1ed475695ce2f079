use crate::models::{Chunk, TextSegment};

pub fn chunk_id(source: &str, page_number: u32, chunk_index: u32) -> String {
    format!("{source}:{page_number}:{chunk_index}")
}

/// Annotates segments with `source:page:index` ids in a single ordered pass.
///
/// The index restarts at zero whenever `(source, page)` differs from the
/// previous segment, so the same segment order always yields the same ids.
pub fn assign_chunk_ids(segments: Vec<TextSegment>) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(segments.len());
    let mut last_page_id: Option<(String, u32)> = None;
    let mut current_chunk_index = 0u32;

    for segment in segments {
        let same_page = last_page_id
            .as_ref()
            .is_some_and(|(source, page)| *source == segment.source && *page == segment.page_number);

        current_chunk_index = if same_page {
            current_chunk_index + 1
        } else {
            0
        };

        if !same_page {
            last_page_id = Some((segment.source.clone(), segment.page_number));
        }

        chunks.push(Chunk {
            id: chunk_id(&segment.source, segment.page_number, current_chunk_index),
            source: segment.source,
            page_number: segment.page_number,
            chunk_index: current_chunk_index,
            content: segment.content,
        });
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(source: &str, page_number: u32, content: &str) -> TextSegment {
        TextSegment {
            source: source.to_string(),
            page_number,
            content: content.to_string(),
        }
    }

    #[test]
    fn ids_follow_source_page_index_layout() {
        let chunks = assign_chunk_ids(vec![
            segment("doc", 0, "p0c0"),
            segment("doc", 0, "p0c1"),
            segment("doc", 1, "p1c0"),
        ]);

        let ids: Vec<_> = chunks.iter().map(|chunk| chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["doc:0:0", "doc:0:1", "doc:1:0"]);
        assert_eq!(chunks[1].chunk_index, 1);
    }

    #[test]
    fn index_resets_when_source_changes_on_same_page_number() {
        let chunks = assign_chunk_ids(vec![
            segment("a.pdf", 0, "one"),
            segment("b.pdf", 0, "two"),
            segment("b.pdf", 0, "three"),
        ]);

        let ids: Vec<_> = chunks.iter().map(|chunk| chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a.pdf:0:0", "b.pdf:0:0", "b.pdf:0:1"]);
    }

    #[test]
    fn identification_is_deterministic() {
        let input = || {
            vec![
                segment("doc", 0, "x"),
                segment("doc", 0, "y"),
                segment("doc", 2, "z"),
            ]
        };

        assert_eq!(assign_chunk_ids(input()), assign_chunk_ids(input()));
    }
}

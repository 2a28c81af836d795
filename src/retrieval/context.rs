//! Rendering of retrieved documents as grounding context for an LLM prompt

use crate::index::ScoredSlice;

/// Render results as numbered `<article>` blocks separated by blank lines
pub fn format_context(slices: &[ScoredSlice]) -> String {
    let articles: Vec<String> = slices
        .iter()
        .enumerate()
        .map(|(i, slice)| {
            let payload = slice.payload.as_ref();
            let title = payload
                .and_then(|p| p.document_title.as_deref())
                .unwrap_or("")
                .trim();
            let url = payload
                .and_then(|p| p.document_url.as_deref())
                .unwrap_or("")
                .trim();

            format!(
                "<article>\nDoc {}: {}\n{}\n\nurl:{}</article>",
                i + 1,
                title,
                slice.content().trim(),
                url
            )
        })
        .collect();

    articles.join("\n\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{PointId, SlicePayload};

    #[test]
    fn test_format_context() {
        let slices = vec![
            ScoredSlice {
                id: PointId::Num(1),
                score: 0.9,
                vector: vec![],
                payload: Some(SlicePayload {
                    document_title: Some(" Ocean acidification ".to_string()),
                    document_url: Some("https://example.org/a".to_string()),
                    slice_content: "Oceans absorb CO2.\n".to_string(),
                    ..Default::default()
                }),
            },
            ScoredSlice {
                id: PointId::Num(2),
                score: 0.8,
                vector: vec![],
                payload: None,
            },
        ];

        let context = format_context(&slices);

        assert_eq!(
            context,
            "<article>\nDoc 1: Ocean acidification\nOceans absorb CO2.\n\nurl:https://example.org/a</article>\n\n\
             <article>\nDoc 2: \n\n\nurl:</article>"
        );
    }

    #[test]
    fn test_empty_context() {
        assert_eq!(format_context(&[]), "");
    }
}

//! Collapse slices of the same document into one result

use crate::index::ScoredSlice;
use ahash::{HashMap, HashMapExt};

/// Separator placed between the contents of two slices of one document
const SLICE_SEPARATOR: &str = "\n\n";

/// Concatenate slices sharing a `document_id`
///
/// Output holds one entry per document, in order of first appearance. The
/// first slice seen for a document is its representative: its score, vector
/// and payload are kept, and the content of every later slice of that
/// document is appended to its `slice_content`. Slices without a payload or
/// with an empty `document_id` are dropped.
pub fn concatenate_same_document(slices: Vec<ScoredSlice>) -> Vec<ScoredSlice> {
    tracing::debug!("concatenate_same_doc_id_slices=start");

    let initial = slices.len();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut documents: Vec<ScoredSlice> = Vec::new();

    for slice in slices {
        let Some(document_id) = slice.document_id().map(str::to_owned) else {
            continue;
        };

        match positions.get(&document_id) {
            Some(&pos) => {
                if let Some(payload) = documents[pos].payload.as_mut() {
                    payload.slice_content.push_str(SLICE_SEPARATOR);
                    payload.slice_content.push_str(slice.content());
                }
            }
            None => {
                positions.insert(document_id, documents.len());
                documents.push(slice);
            }
        }
    }

    tracing::debug!(
        "concatenate_same_doc_id_slices=end nb_results_initial={} nb_docs_final={}",
        initial,
        documents.len()
    );

    documents
}

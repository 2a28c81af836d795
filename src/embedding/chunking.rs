/// Split `text` into chunks of at most `max_words` whitespace-separated words.
///
/// Words are never broken and keep their order. Runs of whitespace collapse to
/// a single space inside a chunk.
pub fn split_for_model(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();

    words.chunks(max_words).map(|chunk| chunk.join(" ")).collect()
}

/// Element-wise mean of equally sized vectors
pub fn mean_pool(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let mut pooled = vec![0.0f32; first.len()];

    for vector in vectors {
        for (acc, value) in pooled.iter_mut().zip(vector) {
            *acc += value;
        }
    }

    let count = vectors.len() as f32;
    pooled.iter_mut().for_each(|v| *v /= count);

    Some(pooled)
}

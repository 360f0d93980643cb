//! Static work partitioner.

/// Split `items` into contiguous chunks of `max(len / workers, 1)` items.
///
/// The final chunk may be shorter, and when the item count is not evenly
/// divisible the number of chunks can exceed `workers`; dispatch submits one
/// pool task per chunk, not per worker, so surplus chunks simply queue.
/// Concatenating the chunks in order reproduces the input exactly.
pub fn partition<T>(items: Vec<T>, workers: usize) -> Vec<Vec<T>> {
    let workers = workers.max(1);
    let chunk_size = (items.len() / workers).max(1);
    let mut chunks = Vec::new();
    let mut iter = items.into_iter();
    loop {
        let chunk: Vec<T> = iter.by_ref().take(chunk_size).collect();
        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip(n: usize, workers: usize) {
        let items: Vec<usize> = (0..n).collect();
        let chunks = partition(items.clone(), workers);

        let expected_chunk_size = (n / workers.max(1)).max(1);
        for chunk in chunks.iter().rev().skip(1) {
            assert_eq!(chunk.len(), expected_chunk_size);
        }
        if let Some(last) = chunks.last() {
            assert!(last.len() <= expected_chunk_size);
            assert!(!last.is_empty());
        }

        let rejoined: Vec<usize> = chunks.into_iter().flatten().collect();
        assert_eq!(rejoined, items);
    }

    #[test]
    fn round_trip_across_assorted_shapes() {
        for n in [0, 1, 2, 7, 10, 16, 100, 101] {
            for workers in [1, 2, 3, 4, 8, 13] {
                assert_round_trip(n, workers);
            }
        }
    }

    #[test]
    fn chunk_count_can_exceed_worker_count() {
        // 10 items over 3 workers: chunk_size = 3, chunks = [3, 3, 3, 1].
        let chunks = partition((0..10).collect::<Vec<_>>(), 3);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], vec![0, 1, 2]);
        assert_eq!(chunks[3], vec![9]);
    }

    #[test]
    fn fewer_items_than_workers_yields_singleton_chunks() {
        let chunks = partition(vec!['a', 'b'], 8);
        assert_eq!(chunks, vec![vec!['a'], vec!['b']]);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        let chunks: Vec<Vec<u8>> = partition(Vec::new(), 4);
        assert!(chunks.is_empty());
    }
}

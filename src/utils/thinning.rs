use itertools::Itertools;

/// Positions removed when a sequence of `len` elements is thinned down to `keep` elements.
///
/// `len - keep` removals are spread uniformly across the sequence: the `i`-th removed
/// position (`i = 1..=len - keep`) is `i * (len - 1) / (len - keep + 1)` rounded half-up.
/// For dense removals two positions may round to the same index, so the result is
/// deduplicated and may be shorter than `len - keep`.
///
pub fn removed_positions(len: usize, keep: usize) -> Vec<usize> {
    if keep >= len {
        return vec![];
    }
    let num_remove = len - keep;
    let step_base = (num_remove + 1) as f64;

    (1..=num_remove)
        .map(|i| {
            let k = (i * (len - 1)) as f64 / step_base;
            let g = k.floor();
            if k - g >= 0.5 {
                g as usize + 1
            } else {
                g as usize
            }
        })
        .dedup()
        .collect()
}

/// Positions that survive thinning `len` elements down to `keep`, in the original order.
///
pub fn kept_positions(len: usize, keep: usize) -> Vec<usize> {
    let removed = removed_positions(len, keep);
    (0..len).filter(|i| !removed.contains(i)).collect()
}

/// Thins `items` down to `keep` elements, spreading removals evenly.
///
pub fn thin<T>(items: Vec<T>, keep: usize) -> Vec<T> {
    let kept = kept_positions(items.len(), keep);
    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| kept.binary_search(i).is_ok())
        .map(|(_, e)| e)
        .collect()
}

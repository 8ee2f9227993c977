use crate::utils::thinning::thin;

/// How many elements of each side survive a representative-set merge.
///
/// # Parameters
/// * `update_count` - how many times the identity has been merged, already incremented for
///   this merge
/// * `gallery_len` - elements currently retained by the identity
/// * `query_len` - elements offered by the incoming session
/// * `max_len` - the retention cap
///
/// # Returns
/// `(keep_gallery, keep_query)`
///
pub fn retention_shares(
    update_count: usize,
    gallery_len: usize,
    query_len: usize,
    max_len: usize,
) -> (usize, usize) {
    if gallery_len + query_len <= max_len {
        return (gallery_len, query_len);
    }
    let keep_query = (max_len / update_count.max(1)).min(query_len);
    (max_len - keep_query, keep_query)
}

/// Bounded representative-set merge.
///
/// The incoming share shrinks as `update_count` grows, so identities seen many times keep
/// their long-run diversity instead of being flushed by the latest session. Each side is
/// thinned with evenly spaced removals, then the gallery side is followed by the query side
/// and the result is cut to `max_len`.
///
pub fn representative_merge<T: Clone>(
    gallery: &[T],
    query: &[T],
    update_count: usize,
    max_len: usize,
) -> Vec<T> {
    let (keep_gallery, keep_query) =
        retention_shares(update_count, gallery.len(), query.len(), max_len);

    let mut merged = thin(gallery.to_vec(), keep_gallery);
    merged.extend(thin(query.to_vec(), keep_query));
    merged.truncate(max_len);
    merged
}

#[cfg(test)]
mod tests {
    use crate::gallery::merge::{representative_merge, retention_shares};

    #[test]
    fn shares() {
        assert_eq!(retention_shares(2, 10, 5, 20), (10, 5));
        assert_eq!(retention_shares(2, 18, 5, 20), (15, 5));
        assert_eq!(retention_shares(5, 20, 20, 20), (16, 4));
        assert_eq!(retention_shares(30, 20, 20, 20), (20, 0));
        assert_eq!(retention_shares(2, 2, 30, 20), (10, 10));
    }

    #[test]
    fn below_cap_keeps_everything() {
        let g = (0..10).collect::<Vec<_>>();
        let q = (100..105).collect::<Vec<_>>();
        let merged = representative_merge(&g, &q, 2, 20);
        assert_eq!(merged.len(), 15);
        assert_eq!(&merged[..10], g.as_slice());
        assert_eq!(&merged[10..], q.as_slice());
    }

    #[test]
    fn seventeen_plus_five_evicts_two() {
        let g = (0..17).collect::<Vec<_>>();
        let q = (100..105).collect::<Vec<_>>();
        let merged = representative_merge(&g, &q, 2, 20);
        assert_eq!(merged.len(), 20);

        let evicted = g.iter().filter(|e| !merged.contains(e)).collect::<Vec<_>>();
        assert_eq!(evicted, vec![&5, &11]);
        assert!(q.iter().all(|e| merged.contains(e)));
    }

    #[test]
    fn eighteen_plus_five_evicts_evenly() {
        let g = (0..18).collect::<Vec<_>>();
        let q = (100..105).collect::<Vec<_>>();
        let merged = representative_merge(&g, &q, 2, 20);
        assert_eq!(merged.len(), 20);

        let evicted = g.iter().filter(|e| !merged.contains(e)).collect::<Vec<_>>();
        assert_eq!(evicted, vec![&4, &9, &13]);
        assert_eq!(merged[0], 0);
        assert_eq!(merged[14], 17);
        assert_eq!(&merged[15..], q.as_slice());
    }

    #[test]
    fn never_exceeds_cap() {
        for max_len in 1..25 {
            for g in 0..30 {
                for q in 0..30 {
                    for u in 1..8 {
                        let gv = (0..g).collect::<Vec<_>>();
                        let qv = (0..q).collect::<Vec<_>>();
                        let merged = representative_merge(&gv, &qv, u, max_len);
                        assert!(merged.len() <= max_len, "g={g} q={q} u={u} m={max_len}");
                    }
                }
            }
        }
    }

    #[test]
    fn later_updates_favour_history() {
        let g = (0..20).collect::<Vec<_>>();
        let q = (100..120).collect::<Vec<_>>();
        let early = representative_merge(&g, &q, 2, 20);
        let late = representative_merge(&g, &q, 10, 20);
        let fresh = |v: &Vec<i32>| v.iter().filter(|e| **e >= 100).count();
        assert_eq!(fresh(&early), 10);
        assert_eq!(fresh(&late), 2);
    }
}

//! Set operations over ranges.

use crate::domain::range::Range;

/// Gaps of `container` not covered by any of `pieces`, in ascending order.
///
/// Pieces that do not lie fully inside the container are ignored. Overlapping and unsorted
/// pieces are fine. The trailing gap is always emitted, so the output can contain
/// zero-width ranges (e.g. `invert(c, [c])` yields empty ranges at both ends of `c`).
pub fn invert(container: &Range, pieces: &[Range]) -> Vec<Range> {
    let outer = container.interval();
    let mut inside: Vec<&Range> = pieces
        .iter()
        .filter(|piece| outer.contains(&piece.interval()))
        .collect();
    inside.sort_by_key(|piece| piece.start);

    let mut gaps = Vec::with_capacity(inside.len() + 1);
    let mut cursor = container.start;
    for piece in inside {
        if piece.start < cursor {
            cursor = cursor.max(piece.end);
            continue;
        }
        gaps.push(gap(container, cursor, piece.start));
        cursor = cursor.max(piece.end);
    }
    gaps.push(gap(container, cursor, container.end));
    gaps
}

/// [`invert`] applied to several containers, concatenated.
pub fn invert_all<'a>(
    containers: impl IntoIterator<Item = &'a Range>,
    pieces: &[Range],
) -> Vec<Range> {
    containers
        .into_iter()
        .flat_map(|container| invert(container, pieces))
        .collect()
}

/// Structural de-duplication preserving first occurrence order.
pub fn dedup(ranges: impl IntoIterator<Item = Range>) -> Vec<Range> {
    let mut unique: Vec<Range> = Vec::new();
    for range in ranges {
        if !unique.contains(&range) {
            unique.push(range);
        }
    }
    unique
}

fn gap(container: &Range, start: usize, end: usize) -> Range {
    Range {
        start,
        end,
        filename: container.filename.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: usize, end: usize) -> Range {
        Range::try_new(start, end, "main.rs").unwrap()
    }

    fn spans(ranges: &[Range]) -> Vec<(usize, usize)> {
        ranges.iter().map(|range| (range.start, range.end)).collect()
    }

    #[test]
    fn no_pieces_returns_container() {
        assert_eq!(invert(&r(3, 30), &[]), vec![r(3, 30)]);
    }

    #[test]
    fn full_piece_leaves_empty_edges() {
        assert_eq!(spans(&invert(&r(3, 30), &[r(3, 30)])), vec![(3, 3), (30, 30)]);
    }

    #[test]
    fn slice_inversion_dims_between_pieces() {
        let gaps = invert(&r(0, 100), &[r(60, 70), r(10, 20)]);
        assert_eq!(spans(&gaps), vec![(0, 10), (20, 60), (70, 100)]);
        assert!(gaps.iter().all(|gap| gap.filename == "main.rs"));
    }

    #[test]
    fn overlapping_and_nested_pieces_do_not_repeat() {
        let gaps = invert(&r(0, 50), &[r(10, 30), r(15, 20), r(25, 35), r(40, 45)]);
        assert_eq!(spans(&gaps), vec![(0, 10), (35, 40), (45, 50)]);
    }

    #[test]
    fn pieces_outside_container_are_ignored() {
        let gaps = invert(&r(10, 20), &[r(0, 12), r(15, 16), r(18, 25)]);
        assert_eq!(spans(&gaps), vec![(10, 15), (16, 20)]);
        assert!(gaps.iter().all(|gap| gap.start <= gap.end));
    }

    #[test]
    fn gaps_and_disjoint_pieces_tile_container() {
        let container = r(0, 90);
        let pieces = vec![r(5, 10), r(10, 22), r(40, 41), r(80, 90)];
        let mut tiles: Vec<Range> = invert(&container, &pieces);
        tiles.extend(pieces);
        tiles.sort_by_key(|range| (range.start, range.end));

        let mut cursor = container.start;
        for tile in tiles.iter().filter(|tile| !tile.is_empty()) {
            assert_eq!(tile.start, cursor, "gap or overlap at {cursor}");
            cursor = tile.end;
        }
        assert_eq!(cursor, container.end);
    }

    #[test]
    fn invert_all_concatenates_containers() {
        let gaps = invert_all([&r(0, 10), &r(20, 30)], &[r(2, 4), r(25, 26)]);
        assert_eq!(spans(&gaps), vec![(0, 2), (4, 10), (20, 25), (26, 30)]);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let unique = dedup(vec![r(1, 2), r(0, 1), r(1, 2)]);
        assert_eq!(spans(&unique), vec![(1, 2), (0, 1)]);
    }
}

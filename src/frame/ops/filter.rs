//! Filter: clause-by-clause index intersection
//!
//! Starts from the universe of row indices and intersects it with each
//! clause's matching index list. Both lists are ascending, so the
//! intersection is a linear merge.

use crate::frame::FrameError;
use crate::frame::dataframe::DataFrame;
use crate::frame::spec::FilterClause;

pub fn apply(frame: &DataFrame, clauses: &[FilterClause]) -> Result<DataFrame, FrameError> {
    let indices = matching_rows(frame, clauses)?;
    Ok(frame.gather(&indices))
}

/// Row indices satisfying every clause, ascending.
pub fn matching_rows(
    frame: &DataFrame,
    clauses: &[FilterClause],
) -> Result<Vec<usize>, FrameError> {
    let mut current: Vec<usize> = (0..frame.row_count()).collect();

    for clause in clauses {
        let column = frame.column(&clause.column)?;
        let matching = column.matching_indices(clause.operator, &clause.literal_text())?;
        current = intersect_sorted(&current, &matching);
        if current.is_empty() {
            break;
        }
    }

    Ok(current)
}

fn intersect_sorted(a: &[usize], b: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

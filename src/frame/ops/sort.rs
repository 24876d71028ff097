//! Sort: stable multi-key index sort
//!
//! Builds one typed comparator per key and stable-sorts a 0..n index vector,
//! evaluating keys left to right and stopping at the first decisive one.
//! Strings compare by resolved text.

use std::cmp::Ordering;

use crate::frame::FrameError;
use crate::frame::column::Column;
use crate::frame::dataframe::DataFrame;
use crate::frame::spec::SortKey;

pub fn apply(frame: &DataFrame, keys: &[SortKey]) -> Result<DataFrame, FrameError> {
    let indices = sorted_rows(frame, keys)?;
    Ok(frame.gather(&indices))
}

/// Row order under the given keys, ascending indices when no keys are given.
pub fn sorted_rows(frame: &DataFrame, keys: &[SortKey]) -> Result<Vec<usize>, FrameError> {
    let mut indices: Vec<usize> = (0..frame.row_count()).collect();
    if keys.is_empty() {
        return Ok(indices);
    }

    let comparators: Vec<(&Column, bool)> = keys
        .iter()
        .map(|key| Ok((frame.column(&key.column)?, key.direction.is_ascending())))
        .collect::<Result<_, FrameError>>()?;

    indices.sort_by(|&a, &b| {
        for (column, ascending) in &comparators {
            let ord = column.compare_rows(a, b);
            let ord = if *ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });

    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::spec::SortDirection;

    fn sample() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_string_column("dept").unwrap();
        df.add_int_column("salary").unwrap();
        for (dept, salary) in [("S", 60), ("E", 80), ("E", 70), ("S", 50)] {
            df.add_row(&[dept, &salary.to_string()]).unwrap();
        }
        df
    }

    #[test]
    fn single_key_ascending() {
        let df = sample();
        let out = apply(&df, &[SortKey::new("salary", SortDirection::Ascending)]).unwrap();
        assert_eq!(
            out.column("salary").unwrap().as_int().unwrap().data(),
            &[50, 60, 70, 80]
        );
    }

    #[test]
    fn multi_key_with_directions() {
        let df = sample();
        let keys = vec![
            SortKey::new("dept", SortDirection::Ascending),
            SortKey::new("salary", SortDirection::Descending),
        ];
        let out = apply(&df, &keys).unwrap();
        assert_eq!(
            out.column("salary").unwrap().as_int().unwrap().data(),
            &[80, 70, 60, 50]
        );
        let dept = out.column("dept").unwrap().as_str().unwrap();
        assert_eq!(dept.at(0), "E");
        assert_eq!(dept.at(3), "S");
    }

    #[test]
    fn stability_on_ties() {
        let mut df = DataFrame::new();
        df.add_int_column("k").unwrap();
        df.add_int_column("seq").unwrap();
        for (k, seq) in [(1, 0), (0, 1), (1, 2), (0, 3)] {
            df.add_row(&[&k.to_string(), &seq.to_string()]).unwrap();
        }
        let out = apply(&df, &[SortKey::new("k", SortDirection::Ascending)]).unwrap();
        // Ties keep their source order.
        assert_eq!(
            out.column("seq").unwrap().as_int().unwrap().data(),
            &[1, 3, 0, 2]
        );
    }

    #[test]
    fn unknown_key_column() {
        let df = sample();
        assert!(matches!(
            apply(&df, &[SortKey::new("ghost", SortDirection::Ascending)]),
            Err(FrameError::UnknownColumn(_))
        ));
    }
}

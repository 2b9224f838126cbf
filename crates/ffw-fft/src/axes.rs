//! Axis canonicalization.

use crate::transforms::FftError;

/// Transformed and batch axes of a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisPartition {
    /// Transformed axes, first occurrence order.
    pub axes: Vec<usize>,
    /// Every remaining axis, ascending.
    pub batch_axes: Vec<usize>,
    /// Positions in the requested list that survived deduplication.
    pub kept: Vec<usize>,
}

/// Resolves negative axes against `rank`, drops repeats, and derives the
/// batch axes.
pub fn canonicalize_axes(requested: &[isize], rank: usize) -> Result<AxisPartition, FftError> {
    if requested.is_empty() {
        return Err(FftError::InvalidAxis {
            detail: "at least one axis must be transformed".to_owned(),
        });
    }
    let signed_rank = isize::try_from(rank).map_err(|_| FftError::InvalidAxis {
        detail: format!("rank {rank} is too large"),
    })?;
    let mut seen = vec![false; rank];
    let mut axes = Vec::with_capacity(requested.len());
    let mut kept = Vec::with_capacity(requested.len());
    for (position, &axis) in requested.iter().enumerate() {
        let resolved = if axis < 0 { axis + signed_rank } else { axis };
        if !(0..signed_rank).contains(&resolved) {
            return Err(FftError::InvalidAxis {
                detail: format!("axis {axis} is out of range for rank {rank}"),
            });
        }
        let resolved = resolved.unsigned_abs();
        if !std::mem::replace(&mut seen[resolved], true) {
            axes.push(resolved);
            kept.push(position);
        }
    }
    let batch_axes = (0..rank).filter(|&axis| !seen[axis]).collect();
    Ok(AxisPartition {
        axes,
        batch_axes,
        kept,
    })
}

#[cfg(test)]
mod tests {
    use super::canonicalize_axes;
    use crate::FftError;

    #[test]
    fn negative_axes_resolve_against_rank() {
        let partition = canonicalize_axes(&[-1], 3).expect("axes should resolve");
        assert_eq!(partition.axes, vec![2]);
        assert_eq!(partition.batch_axes, vec![0, 1]);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let partition = canonicalize_axes(&[2, 0, -1, 0], 3).expect("axes should resolve");
        assert_eq!(partition.axes, vec![2, 0]);
        assert_eq!(partition.kept, vec![0, 1]);
        assert_eq!(partition.batch_axes, vec![1]);
    }

    #[test]
    fn out_of_range_axes_are_rejected() {
        assert!(matches!(
            canonicalize_axes(&[3], 3),
            Err(FftError::InvalidAxis { .. })
        ));
        assert!(matches!(
            canonicalize_axes(&[-4], 3),
            Err(FftError::InvalidAxis { .. })
        ));
        assert!(matches!(
            canonicalize_axes(&[0], 0),
            Err(FftError::InvalidAxis { .. })
        ));
    }

    #[test]
    fn empty_axis_list_is_rejected() {
        assert!(matches!(
            canonicalize_axes(&[], 2),
            Err(FftError::InvalidAxis { .. })
        ));
    }
}

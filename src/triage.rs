//! Acuity banding and priority-rank validation.
//!
//! Acuity assignment is a clinical judgment input, mirroring real ESI triage
//! workflow: the clinician supplies both the level and a candidate rank, and
//! this module's job is to reject ranks outside the level's band, never to
//! derive them from vitals.

use crate::error::{FlowError, FlowResult};

/// Priority-rank band per acuity level; a `None` upper bound is open-ended.
/// Bands are non-overlapping, so (level, rank) pairs order consistently.
const BANDS: [(u32, Option<u32>); 5] = [
    (1, Some(20)),
    (21, Some(70)),
    (71, Some(170)),
    (171, Some(320)),
    (321, None),
];

/// The inclusive rank band for an acuity level.
pub fn band_for_level(level: u8) -> FlowResult<(u32, Option<u32>)> {
    if !(1..=5).contains(&level) {
        return Err(FlowError::ValidationFailed(format!(
            "acuity level must be 1-5, got {level}"
        )));
    }
    Ok(BANDS[(level - 1) as usize])
}

/// Rejects any rank outside the band for the chosen level.
pub fn validate_band(level: u8, rank: u32) -> FlowResult<()> {
    let (low, high) = band_for_level(level)?;
    let in_band = rank >= low && high.map_or(true, |high| rank <= high);
    if in_band {
        Ok(())
    } else {
        Err(FlowError::OutOfBandPriority { level, rank })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(1, 1)]
    #[test_case(1, 20)]
    #[test_case(2, 21)]
    #[test_case(2, 70)]
    #[test_case(3, 71)]
    #[test_case(3, 170)]
    #[test_case(4, 171)]
    #[test_case(4, 320)]
    #[test_case(5, 321)]
    #[test_case(5, 9000)]
    fn in_band_ranks_are_accepted(level: u8, rank: u32) {
        validate_band(level, rank).expect("rank sits inside the band");
    }

    #[test_case(1, 21)]
    #[test_case(1, 500)]
    #[test_case(2, 20)]
    #[test_case(3, 320)]
    #[test_case(4, 70)]
    #[test_case(5, 320)]
    fn out_of_band_ranks_are_rejected(level: u8, rank: u32) {
        match validate_band(level, rank) {
            Err(FlowError::OutOfBandPriority {
                level: l,
                rank: r,
            }) => {
                assert_eq!((l, r), (level, rank));
            }
            other => panic!("expected OutOfBandPriority, got {other:?}"),
        }
    }

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(3)]
    #[test_case(4)]
    #[test_case(5)]
    fn rank_zero_sits_below_every_band(level: u8) {
        assert!(matches!(
            validate_band(level, 0),
            Err(FlowError::OutOfBandPriority { .. })
        ));
    }

    #[test_case(0)]
    #[test_case(6)]
    fn acuity_outside_one_to_five_is_invalid(level: u8) {
        assert!(matches!(
            band_for_level(level),
            Err(FlowError::ValidationFailed(_))
        ));
    }

    #[test]
    fn bands_do_not_overlap() {
        for window in BANDS.windows(2) {
            let (_, high) = window[0];
            let (next_low, _) = window[1];
            assert_eq!(high.expect("only level 5 is open-ended") + 1, next_low);
        }
    }
}

//! Banded wall-distance correction.
//!
//! The side reading is looked up in an ordered table of inclusive distance
//! bands, each carrying a (right, left) speed pair.  Close to the wall the
//! right motor is driven harder than the left so the robot steers away, far
//! from it the other way round, and the target band drives both equally.
//!
//! The default table leaves exactly 2200 and 2700 ticks uncovered.  A reading
//! that falls in no band issues no command and the motors keep their speeds.
//!
//! # Example
//!
//! ```rust
//! use corridor_runtime::correction::CorrectionTable;
//! use corridor_types::SpeedPair;
//!
//! let table = CorrectionTable::default();
//! assert_eq!(table.band_for(2400).map(|b| b.speeds()), Some(SpeedPair::new(40, 40)));
//! assert!(table.band_for(2200).is_none());
//! ```

use corridor_hal::MotorChannel;
use corridor_types::{CorridorError, MAX_SPEED, SpeedPair, Ticks};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ─────────────────────────────────────────────────────────────────────────────
// Bands
// ─────────────────────────────────────────────────────────────────────────────

/// One row of the correction table.  Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionBand {
    pub low: Ticks,
    pub high: Ticks,
    pub right: u8,
    pub left: u8,
}

impl CorrectionBand {
    pub const fn new(low: Ticks, high: Ticks, right: u8, left: u8) -> Self {
        Self {
            low,
            high,
            right,
            left,
        }
    }

    pub fn contains(&self, side: Ticks) -> bool {
        (self.low..=self.high).contains(&side)
    }

    pub fn speeds(&self) -> SpeedPair {
        SpeedPair::new(self.right, self.left)
    }
}

pub const DEFAULT_BANDS: [CorrectionBand; 9] = [
    CorrectionBand::new(0, 500, 60, 20),
    CorrectionBand::new(501, 1000, 55, 25),
    CorrectionBand::new(1001, 1500, 50, 30),
    CorrectionBand::new(1501, 2199, 45, 35),
    CorrectionBand::new(2201, 2699, 40, 40),
    CorrectionBand::new(2701, 3200, 35, 45),
    CorrectionBand::new(3201, 4000, 30, 50),
    CorrectionBand::new(4001, 4500, 25, 55),
    CorrectionBand::new(4501, Ticks::MAX, 20, 60),
];

// ─────────────────────────────────────────────────────────────────────────────
// Table
// ─────────────────────────────────────────────────────────────────────────────

/// Sorted, non-overlapping correction bands.  Gaps are allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionTable {
    bands: Vec<CorrectionBand>,
}

impl CorrectionTable {
    /// Build a table after checking that every band is well formed, bands are
    /// in ascending order, none overlap, and no speed exceeds 127.
    pub fn new(bands: Vec<CorrectionBand>) -> Result<Self, CorridorError> {
        let table = Self { bands };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> Result<(), CorridorError> {
        for (i, band) in self.bands.iter().enumerate() {
            if band.low > band.high {
                return Err(CorridorError::InvalidConfig(format!(
                    "correction band {i}: low {} above high {}",
                    band.low, band.high
                )));
            }
            if band.right > MAX_SPEED || band.left > MAX_SPEED {
                return Err(CorridorError::InvalidConfig(format!(
                    "correction band {i}: speed above {MAX_SPEED}"
                )));
            }
        }
        for (i, pair) in self.bands.windows(2).enumerate() {
            if pair[1].low <= pair[0].high {
                return Err(CorridorError::InvalidConfig(format!(
                    "correction bands {i} and {} overlap or are out of order",
                    i + 1
                )));
            }
        }
        Ok(())
    }

    pub fn band_for(&self, side: Ticks) -> Option<&CorrectionBand> {
        self.bands.iter().find(|band| band.contains(side))
    }
}

impl Default for CorrectionTable {
    fn default() -> Self {
        Self {
            bands: DEFAULT_BANDS.to_vec(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Controller
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct CorrectionController {
    table: CorrectionTable,
}

impl CorrectionController {
    pub fn new(table: CorrectionTable) -> Self {
        Self { table }
    }

    /// Pure lookup of the speeds for `side`.
    pub fn speeds_for(&self, side: Ticks) -> Option<SpeedPair> {
        self.table.band_for(side).map(CorrectionBand::speeds)
    }

    /// Drive the speeds of the band containing `side`, right motor first.
    /// Returns the pair sent, or `None` if `side` fell in a gap.
    pub fn correct(&self, side: Ticks, motors: &mut MotorChannel) -> Option<SpeedPair> {
        let speeds = self.speeds_for(side);
        match speeds {
            Some(pair) => motors.drive(pair),
            None => debug!(side, "side reading outside every correction band"),
        }
        speeds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use corridor_hal::{CaptureEngine, SimRig};

    #[test]
    fn default_table_is_valid() {
        assert!(CorrectionTable::default().validate().is_ok());
    }

    #[test]
    fn boundaries_map_to_documented_pairs() {
        let c = CorrectionController::default();
        let cases = [
            (0, (60, 20)),
            (500, (60, 20)),
            (501, (55, 25)),
            (1000, (55, 25)),
            (1001, (50, 30)),
            (1500, (50, 30)),
            (1501, (45, 35)),
            (2199, (45, 35)),
            (2201, (40, 40)),
            (2699, (40, 40)),
            (2701, (35, 45)),
            (3200, (35, 45)),
            (3201, (30, 50)),
            (4000, (30, 50)),
            (4001, (25, 55)),
            (4500, (25, 55)),
            (4501, (20, 60)),
            (Ticks::MAX, (20, 60)),
        ];
        for (side, (right, left)) in cases {
            assert_eq!(
                c.speeds_for(side),
                Some(SpeedPair::new(right, left)),
                "side = {side}"
            );
        }
    }

    #[test]
    fn target_band_is_balanced() {
        let c = CorrectionController::default();
        for side in [2201, 2450, 2699] {
            let pair = c.speeds_for(side).unwrap();
            assert_eq!(pair.right, pair.left);
        }
    }

    #[test]
    fn target_band_edges_fall_in_the_gap() {
        let c = CorrectionController::default();
        assert_eq!(c.speeds_for(2200), None);
        assert_eq!(c.speeds_for(2700), None);
    }

    #[test]
    fn gap_sends_nothing() {
        let engine = Arc::new(CaptureEngine::default());
        let rig = SimRig::new(engine, 1_200_000).build();
        let mut motors = MotorChannel::new(rig.motor_link);
        let c = CorrectionController::default();

        assert_eq!(c.correct(2700, &mut motors), None);
        assert!(rig.probe.motor_bytes().is_empty());

        assert_eq!(c.correct(1805, &mut motors), Some(SpeedPair::new(45, 35)));
        assert_eq!(rig.probe.motor_bytes(), vec![45, 35 + 128]);
    }

    #[test]
    fn rejects_overlap() {
        let err = CorrectionTable::new(vec![
            CorrectionBand::new(0, 100, 60, 20),
            CorrectionBand::new(100, 200, 40, 40),
        ])
        .unwrap_err();
        assert!(matches!(err, CorridorError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_unsorted() {
        assert!(
            CorrectionTable::new(vec![
                CorrectionBand::new(300, 400, 60, 20),
                CorrectionBand::new(0, 100, 40, 40),
            ])
            .is_err()
        );
    }

    #[test]
    fn rejects_inverted_band_and_fast_speed() {
        assert!(CorrectionTable::new(vec![CorrectionBand::new(10, 5, 40, 40)]).is_err());
        assert!(CorrectionTable::new(vec![CorrectionBand::new(0, 5, 128, 40)]).is_err());
    }

    #[test]
    fn empty_table_never_corrects() {
        let c = CorrectionController::new(CorrectionTable::new(Vec::new()).unwrap());
        assert_eq!(c.speeds_for(2400), None);
    }
}

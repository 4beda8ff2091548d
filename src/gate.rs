//! Volume gate
//!
//! Symbols whose trailing average volume is below the floor are rejected before
//! detection runs.

use tracing::debug;

use crate::{params::GateParams, Period, Result, ScreenError, OHLCV};

/// Mean volume of the last `window` bars, ignoring bars with non-positive volume.
///
/// # Errors
///
/// `InsufficientData` if fewer than `window` bars exist; `NoVolumeData` if no bar in
/// the window traded.
pub fn average_volume<T: OHLCV>(bars: &[T], window: Period) -> Result<f64> {
    let n = window.get();
    if bars.len() < n {
        return Err(ScreenError::InsufficientData {
            need: n,
            got: bars.len(),
        });
    }

    let (sum, count) = bars[bars.len() - n..]
        .iter()
        .map(|b| b.volume())
        .filter(|v| *v > 0.0)
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        return Err(ScreenError::NoVolumeData { window: n });
    }
    Ok(sum / count as f64)
}

/// Apply the volume floor. Returns the trailing average on success.
pub fn check_volume<T: OHLCV>(bars: &[T], params: &GateParams) -> Result<f64> {
    let average = average_volume(bars, params.window)?;
    if average < params.min_avg_volume {
        debug!(average, floor = params.min_avg_volume, "volume gate rejected");
        return Err(ScreenError::VolumeTooLow {
            average,
            floor: params.min_avg_volume,
        });
    }
    Ok(average)
}

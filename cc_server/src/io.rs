//! Digital I/O codec.
//!
//! The signal space is flat bit addresses organized into 32-line columns;
//! each column is written through the backend as a 64-bit data word plus a
//! 64-bit mask word, split into 32-bit halves. A mask bit of 1 leaves the
//! line untouched.

use arm_cc::backend::{value_u32, BackendDriver};
use arm_cc::errors::CcError;
use tokio::sync::Mutex;
use tracing::warn;

/// Lines per addressable column.
pub const COLUMN_WIDTH: u32 = 32;

/// Column carrying the ADC measurement and mode bits.
const ADC_COLUMN: u32 = 2;

/// A write pattern covers at most one column's worth of lines.
const PATTERN_MAX: usize = 32;

/// Serialized access to the backend's raw word I/O. One lock covers every
/// codec operation so partial column updates cannot interleave.
pub struct IoPort {
    lock: Mutex<()>,
}

impl IoPort {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }

    /// Writes a `{0,1,*}` pattern right-aligned at `address`. Characters
    /// outside the alphabet are stripped, matching what clients actually
    /// send.
    pub async fn write_bits(
        &self,
        driver: &BackendDriver,
        address: u32,
        signal: &str,
    ) -> Result<(), CcError> {
        let pattern = sanitize(signal);
        let (data, mask) = pack_pattern(&pattern, address % COLUMN_WIDTH)?;
        let column = address / COLUMN_WIDTH;
        let _guard = self.lock.lock().await;
        let outcome = driver
            .column_io(column, low(data), low(mask), high(data), high(mask))
            .await?;
        if let Err(fault) = outcome {
            warn!("digital write to column {} failed: {}", column, fault);
        }
        Ok(())
    }

    /// Reads the lines from `start` to `end` (inclusive, same column) as a
    /// bit string ordered highest address first. `None` reads the single
    /// line at `start`.
    pub async fn read_bits(
        &self,
        driver: &BackendDriver,
        start: u32,
        end: Option<u32>,
    ) -> Result<String, CcError> {
        let column = start / COLUMN_WIDTH;
        let end = end.unwrap_or(start);
        if end < start || end / COLUMN_WIDTH != column {
            return Err(CcError::Payload(format!(
                "address range {}..{} does not fit column {}",
                start, end, column
            )));
        }
        let word = self.read_column(driver, column).await?;
        Ok(slice_bits(word, start % COLUMN_WIDTH, end % COLUMN_WIDTH))
    }

    /// Packs a channel's 2-bit measurement mode into the ADC column,
    /// leaving every other line alone.
    pub async fn set_adc(
        &self,
        driver: &BackendDriver,
        channel: u8,
        mode: u8,
    ) -> Result<(), CcError> {
        if channel > 1 {
            return Err(CcError::Payload(format!("bad ADC channel {}", channel)));
        }
        if mode > 2 {
            return Err(CcError::Payload(format!("bad ADC mode {}", mode)));
        }
        let mut data = (mode as u32) << 12;
        let mut mask: u32 = 0xFFFF_CFFF;
        if channel == 1 {
            data <<= 16;
            mask = 0xCFFF_FFFF;
        }
        let _guard = self.lock.lock().await;
        let outcome = driver
            .column_io(ADC_COLUMN, data, mask, u32::MAX, u32::MAX)
            .await?;
        if let Err(fault) = outcome {
            warn!("ADC configuration failed: {}", fault);
        }
        Ok(())
    }

    /// Both channels' current 12-bit readings from the ADC column.
    pub async fn read_adc(&self, driver: &BackendDriver) -> Result<(u16, u16), CcError> {
        let word = self.read_column(driver, ADC_COLUMN).await?;
        let low_word = (word & 0xFFFF_FFFF) as u32;
        Ok((
            (low_word & 0x0FFF) as u16,
            ((low_word >> 16) & 0x0FFF) as u16,
        ))
    }

    /// Read-only fetch of a column: all-ones data and mask change nothing.
    async fn read_column(&self, driver: &BackendDriver, column: u32) -> Result<u64, CcError> {
        let _guard = self.lock.lock().await;
        let outcome = driver
            .column_io(column, u32::MAX, u32::MAX, u32::MAX, u32::MAX)
            .await?;
        let values = outcome
            .map_err(|fault| CcError::Payload(format!("column {} read failed: {}", column, fault)))?;
        let low_word = value_u32(&values, 0)?;
        let high_word = value_u32(&values, 1)?;
        Ok(((high_word as u64) << 32) | low_word as u64)
    }
}

impl Default for IoPort {
    fn default() -> Self {
        Self::new()
    }
}

fn sanitize(signal: &str) -> String {
    signal
        .chars()
        .filter(|c| matches!(c, '0' | '1' | '*'))
        .collect()
}

/// Builds the 64-bit data and mask words for a pattern whose rightmost
/// character lands on line `row`. Bits shifted past the column pair are
/// dropped.
fn pack_pattern(pattern: &str, row: u32) -> Result<(u64, u64), CcError> {
    if pattern.len() > PATTERN_MAX {
        return Err(CcError::Payload(format!(
            "signal pattern longer than {} lines",
            PATTERN_MAX
        )));
    }
    let mut data: u64 = 0;
    let mut mask: u64 = u64::MAX;
    for (i, ch) in pattern.chars().rev().enumerate() {
        let bit = row as u64 + i as u64;
        if bit >= 64 {
            break;
        }
        let b = 1u64 << bit;
        match ch {
            '1' => {
                data |= b;
                mask &= !b;
            }
            '0' => {
                mask &= !b;
            }
            _ => {}
        }
    }
    Ok((data, mask))
}

/// Line address `n` sits at string index `63 - n`, so the output runs from
/// the end address down to the start address.
fn slice_bits(word: u64, start_row: u32, end_row: u32) -> String {
    (start_row..=end_row)
        .rev()
        .map(|bit| if word >> bit & 1 == 1 { '1' } else { '0' })
        .collect()
}

fn low(word: u64) -> u32 {
    (word & 0xFFFF_FFFF) as u32
}

fn high(word: u64) -> u32 {
    (word >> 32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_packs_right_aligned_at_row() {
        let (data, mask) = pack_pattern("10*1", 5).unwrap();
        assert_eq!(data, (1 << 5) | (1 << 8));
        // lines 5, 7, 8 written; line 6 untouched
        assert_eq!(mask, !((1u64 << 5) | (1 << 7) | (1 << 8)));
    }

    #[test]
    fn pattern_crosses_word_halves() {
        let (data, mask) = pack_pattern("111", 30).unwrap();
        assert_eq!(data, 0x1_C000_0000);
        assert_eq!(low(data), 0xC000_0000);
        assert_eq!(high(data), 0x1);
        assert_eq!(mask, !0x1_C000_0000u64);
    }

    #[test]
    fn pattern_overflow_is_dropped() {
        let (data, _) = pack_pattern("1111", 62).unwrap();
        assert_eq!(data, (1u64 << 62) | (1 << 63));
    }

    #[test]
    fn oversized_pattern_is_rejected() {
        assert!(pack_pattern(&"1".repeat(33), 0).is_err());
        assert!(pack_pattern(&"1".repeat(32), 0).is_ok());
    }

    #[test]
    fn empty_pattern_is_a_no_op_write() {
        let (data, mask) = pack_pattern("", 12).unwrap();
        assert_eq!(data, 0);
        assert_eq!(mask, u64::MAX);
    }

    #[test]
    fn sanitize_strips_foreign_characters() {
        assert_eq!(sanitize("1 0-*x1"), "10*1");
    }

    #[test]
    fn slice_orders_highest_address_first() {
        let word = (1u64 << 5) | (1 << 8);
        assert_eq!(slice_bits(word, 5, 8), "1001");
        assert_eq!(slice_bits(word, 5, 5), "1");
        assert_eq!(slice_bits(word, 6, 6), "0");
    }
}

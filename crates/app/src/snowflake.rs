//! Snowflake order numbers.
//!
//! Layout, most significant first: 41 bits of milliseconds since the configured
//! epoch, 10 bits of machine id, 12 bits of per-millisecond sequence.

use std::sync::{Mutex, PoisonError};

use jiff::{Timestamp, civil::Date, tz::TimeZone};
use thiserror::Error;

const MACHINE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const TIMESTAMP_BITS: u32 = 41;

pub const MAX_MACHINE_ID: u16 = (1 << MACHINE_BITS) - 1;
const MAX_SEQUENCE: i64 = (1 << SEQUENCE_BITS) - 1;
const MAX_ELAPSED_MS: i64 = (1 << TIMESTAMP_BITS) - 1;

/// How far an exhausted sequence may borrow future milliseconds.
const MAX_LEAD_MS: i64 = 1_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnowflakeError {
    #[error("machine id {0} does not fit in {MACHINE_BITS} bits")]
    InvalidMachineId(u16),

    #[error("snowflake epoch is in the future")]
    EpochInFuture,

    #[error("snowflake epoch could not be resolved")]
    InvalidEpoch,

    #[error("timestamp no longer fits in {TIMESTAMP_BITS} bits")]
    TimestampOverflow,

    #[error("issued ids run {lead_ms}ms ahead of the clock")]
    ClockBehind { lead_ms: i64 },
}

#[derive(Debug)]
struct State {
    last_ms: i64,
    sequence: i64,
}

/// Thread-safe generator of 64-bit, roughly time-ordered ids.
#[derive(Debug)]
pub struct Snowflake {
    epoch_ms: i64,
    machine_id: i64,
    state: Mutex<State>,
}

impl Snowflake {
    /// Create a generator whose timestamps count from midnight UTC of `start_date`.
    ///
    /// # Errors
    ///
    /// Returns an error when the machine id is out of range or the start date is
    /// in the future.
    pub fn new(machine_id: u16, start_date: Date) -> Result<Self, SnowflakeError> {
        if machine_id > MAX_MACHINE_ID {
            return Err(SnowflakeError::InvalidMachineId(machine_id));
        }

        let epoch_ms = start_date
            .to_zoned(TimeZone::UTC)
            .map_err(|_source| SnowflakeError::InvalidEpoch)?
            .timestamp()
            .as_millisecond();

        if epoch_ms > Timestamp::now().as_millisecond() {
            return Err(SnowflakeError::EpochInFuture);
        }

        Ok(Self {
            epoch_ms,
            machine_id: i64::from(machine_id),
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    /// Issue the next id without blocking.
    ///
    /// When a millisecond's sequence is used up, or the clock has stepped back,
    /// ids continue from the next millisecond ahead of the clock.
    ///
    /// # Errors
    ///
    /// Returns [`SnowflakeError::ClockBehind`] when that would run more than a
    /// second ahead, and [`SnowflakeError::TimestampOverflow`] once the 41-bit
    /// clock wraps.
    pub fn next_id(&self) -> Result<i64, SnowflakeError> {
        self.issue(self.elapsed_ms())
    }

    fn issue(&self, clock_ms: i64) -> Result<i64, SnowflakeError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let (ms, sequence) = if clock_ms > state.last_ms {
            (clock_ms, 0)
        } else if state.sequence < MAX_SEQUENCE {
            (state.last_ms, state.sequence + 1)
        } else {
            let borrowed = state.last_ms + 1;
            let lead_ms = borrowed - clock_ms;

            if lead_ms > MAX_LEAD_MS {
                return Err(SnowflakeError::ClockBehind { lead_ms });
            }

            (borrowed, 0)
        };

        if ms > MAX_ELAPSED_MS {
            return Err(SnowflakeError::TimestampOverflow);
        }

        state.last_ms = ms;
        state.sequence = sequence;

        Ok((ms << (MACHINE_BITS + SEQUENCE_BITS)) | (self.machine_id << SEQUENCE_BITS) | sequence)
    }

    fn elapsed_ms(&self) -> i64 {
        Timestamp::now().as_millisecond() - self.epoch_ms
    }
}

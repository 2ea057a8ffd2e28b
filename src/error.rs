use core::fmt;

/// Failure reported by a sensor capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Device did not answer at bring-up; the sensor never produces samples.
    Unavailable,
    /// A single bus transaction failed; the tick is skipped.
    Bus,
    /// The device has no fresh data yet (e.g. temperature conversion pending).
    NotReady,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Unavailable => f.write_str("sensor unavailable"),
            SensorError::Bus => f.write_str("sensor bus error"),
            SensorError::NotReady => f.write_str("sensor not ready"),
        }
    }
}

/// Failure to hand a snapshot to the inter-processor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelError {
    /// The single slot still holds an unread snapshot.
    Full,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Full => f.write_str("channel full"),
        }
    }
}

/// A received frame does not hold a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    Length { expected: usize, actual: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Length { expected, actual } => {
                write!(f, "frame length {} (expected {})", actual, expected)
            }
        }
    }
}

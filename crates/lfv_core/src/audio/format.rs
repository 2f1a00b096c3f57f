//! Checks that decoded buffers are in the mix format.
//!
//! Conversion happens in the decoder; nothing here resamples or remixes.

use super::types::{MixError, MixResult, PcmBuffer};

/// Verify `buffer` is well formed and carries `sample_rate` and `channels`.
pub fn check_format(buffer: &PcmBuffer, sample_rate: u32, channels: u16) -> MixResult<()> {
    if sample_rate == 0 || channels == 0 {
        return Err(MixError::InvalidBuffer(format!(
            "target {} Hz / {} channels",
            sample_rate, channels
        )));
    }
    if buffer.sample_rate == 0 || buffer.channels == 0 {
        return Err(MixError::InvalidBuffer(format!(
            "{} Hz / {} channels",
            buffer.sample_rate, buffer.channels
        )));
    }
    if buffer.samples.len() % buffer.channels as usize != 0 {
        return Err(MixError::InvalidBuffer(format!(
            "{} samples do not divide into {} channels",
            buffer.samples.len(),
            buffer.channels
        )));
    }
    if buffer.sample_rate != sample_rate || buffer.channels != channels {
        return Err(MixError::InvalidBuffer(format!(
            "decoded as {} Hz / {} ch, mix expects {} Hz / {} ch",
            buffer.sample_rate, buffer.channels, sample_rate, channels
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_buffer_passes() {
        let buf = PcmBuffer::new(vec![0.0; 96], 48000, 2);
        assert!(check_format(&buf, 48000, 2).is_ok());
    }

    #[test]
    fn other_rate_is_rejected() {
        let buf = PcmBuffer::new(vec![0.0; 441], 44100, 1);
        let err = check_format(&buf, 48000, 2).unwrap_err();
        assert!(matches!(err, MixError::InvalidBuffer(m) if m.contains("44100")));
    }

    #[test]
    fn ragged_buffer_is_rejected() {
        let buf = PcmBuffer::new(vec![0.0, 0.0, 0.0], 48000, 2);
        assert!(matches!(
            check_format(&buf, 48000, 2),
            Err(MixError::InvalidBuffer(m)) if m.contains("divide")
        ));
    }

    #[test]
    fn zero_target_is_rejected() {
        let buf = PcmBuffer::new(vec![], 48000, 2);
        assert!(check_format(&buf, 0, 2).is_err());
    }
}

use crate::foundation::error::{BlarpError, BlarpResult};

/// 0-based position of a frame in the output sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> BlarpResult<Self> {
        if den == 0 {
            return Err(BlarpError::validation("fps den must be > 0"));
        }
        if num == 0 {
            return Err(BlarpError::validation("fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn integer(fps: u32) -> BlarpResult<Self> {
        Self::new(fps, 1)
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Parse ffmpeg's `num/den` ratio notation (e.g. `30000/1001`).
    pub fn parse_ratio(s: &str) -> Option<Self> {
        let (a, b) = s.trim().split_once('/')?;
        Self::new(a.parse().ok()?, b.parse().ok()?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_rejects_zero_parts() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
        assert_eq!(Fps::integer(30).unwrap().as_f64(), 30.0);
    }

    #[test]
    fn fps_parses_ffprobe_ratios() {
        assert_eq!(Fps::parse_ratio("30000/1001"), Some(Fps { num: 30000, den: 1001 }));
        assert_eq!(Fps::parse_ratio("25/1"), Some(Fps { num: 25, den: 1 }));
        assert_eq!(Fps::parse_ratio("0/0"), None);
        assert_eq!(Fps::parse_ratio("garbage"), None);
    }

    #[test]
    fn frame_index_next_increments() {
        assert_eq!(FrameIndex(4).next(), FrameIndex(5));
    }
}

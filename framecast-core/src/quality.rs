//! Loss-driven compression quality control.
//!
//! The sender reports every chunk send failure and every frame that
//! went out whole. Failures accumulate in `consecutive_errors`; once
//! they reach `error_threshold` the quality drops one step. A clean
//! frame with no outstanding errors raises it one step. A clean frame
//! that follows errors only clears the streak, so recovery takes two
//! clean frames rather than one.
//!
//! The new quality applies to the next encode; nothing changes
//! mid-frame.

use crate::error::StreamError;

/// Bounds and step sizes for [`QualityController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityConfig {
    pub min_quality: u8,
    pub max_quality: u8,
    /// Amount added or removed per adjustment.
    pub step: u8,
    /// Consecutive send failures that trigger a step down.
    pub error_threshold: u32,
    /// Quality used for the first frame.
    pub initial_quality: u8,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_quality: 60,
            max_quality: 85,
            step: 5,
            error_threshold: 3,
            initial_quality: 70,
        }
    }
}

impl QualityConfig {
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.min_quality == 0 || self.max_quality > 100 {
            return Err(StreamError::InvalidConfig("quality bounds must lie in 1..=100"));
        }
        if self.min_quality > self.max_quality {
            return Err(StreamError::InvalidConfig("min_quality exceeds max_quality"));
        }
        if self.step == 0 {
            return Err(StreamError::InvalidConfig("quality step must be non-zero"));
        }
        if self.error_threshold == 0 {
            return Err(StreamError::InvalidConfig("error_threshold must be non-zero"));
        }
        if !(self.min_quality..=self.max_quality).contains(&self.initial_quality) {
            return Err(StreamError::InvalidConfig(
                "initial_quality outside min_quality..=max_quality",
            ));
        }
        Ok(())
    }
}

/// A quality transition, returned so callers can log it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityChange {
    pub old: u8,
    pub new: u8,
}

/// Sender-owned quality state machine.
#[derive(Debug, Clone)]
pub struct QualityController {
    config: QualityConfig,
    quality: u8,
    consecutive_errors: u32,
}

impl QualityController {
    /// The caller is expected to have validated `config`; the initial
    /// quality is clamped into range regardless.
    pub fn new(config: QualityConfig) -> Self {
        let quality = config
            .initial_quality
            .clamp(config.min_quality, config.max_quality.max(config.min_quality));
        Self {
            config,
            quality,
            consecutive_errors: 0,
        }
    }

    /// Quality to pass to the next encode.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// A chunk send failed (would-block excluded).
    pub fn record_send_failure(&mut self) -> Option<QualityChange> {
        self.consecutive_errors += 1;
        if self.consecutive_errors < self.config.error_threshold {
            return None;
        }
        self.consecutive_errors = 0;

        let old = self.quality;
        self.quality = old
            .saturating_sub(self.config.step)
            .max(self.config.min_quality);
        (self.quality != old).then_some(QualityChange {
            old,
            new: self.quality,
        })
    }

    /// Every chunk of a frame was sent without error.
    pub fn record_frame_sent(&mut self) -> Option<QualityChange> {
        if self.consecutive_errors > 0 {
            self.consecutive_errors = 0;
            return None;
        }

        let old = self.quality;
        self.quality = old
            .saturating_add(self.config.step)
            .min(self.config.max_quality);
        (self.quality != old).then_some(QualityChange {
            old,
            new: self.quality,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(initial: u8) -> QualityController {
        QualityController::new(QualityConfig {
            initial_quality: initial,
            ..Default::default()
        })
    }

    #[test]
    fn steps_down_after_threshold_failures() {
        let mut qc = controller(70);
        assert_eq!(qc.record_send_failure(), None);
        assert_eq!(qc.record_send_failure(), None);
        assert_eq!(qc.consecutive_errors(), 2);

        let change = qc.record_send_failure();
        assert_eq!(change, Some(QualityChange { old: 70, new: 65 }));
        assert_eq!(qc.quality(), 65);
        assert_eq!(qc.consecutive_errors(), 0);
    }

    #[test]
    fn step_down_clamps_at_min() {
        let mut qc = controller(62);
        for _ in 0..3 {
            qc.record_send_failure();
        }
        assert_eq!(qc.quality(), 60);

        for _ in 0..3 {
            qc.record_send_failure();
        }
        assert_eq!(qc.quality(), 60);
        assert_eq!(qc.consecutive_errors(), 0);
    }

    #[test]
    fn clean_frame_steps_up() {
        let mut qc = controller(70);
        assert_eq!(
            qc.record_frame_sent(),
            Some(QualityChange { old: 70, new: 75 })
        );
        assert_eq!(qc.quality(), 75);
    }

    #[test]
    fn step_up_clamps_at_max() {
        let mut qc = controller(83);
        qc.record_frame_sent();
        assert_eq!(qc.quality(), 85);
        assert_eq!(qc.record_frame_sent(), None);
        assert_eq!(qc.quality(), 85);
    }

    #[test]
    fn clean_frame_after_errors_only_clears_streak() {
        let mut qc = controller(70);
        qc.record_send_failure();
        assert_eq!(qc.record_frame_sent(), None);
        assert_eq!(qc.quality(), 70);
        assert_eq!(qc.consecutive_errors(), 0);

        qc.record_frame_sent();
        assert_eq!(qc.quality(), 75);
    }

    #[test]
    fn initial_quality_is_clamped() {
        let qc = QualityController::new(QualityConfig {
            initial_quality: 99,
            ..Default::default()
        });
        assert_eq!(qc.quality(), 85);
    }

    #[test]
    fn validate_rejects_bad_bounds() {
        let inverted = QualityConfig {
            min_quality: 90,
            max_quality: 80,
            initial_quality: 85,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let zero_step = QualityConfig {
            step: 0,
            ..Default::default()
        };
        assert!(zero_step.validate().is_err());

        assert!(QualityConfig::default().validate().is_ok());
    }
}

use log::debug;
use log::info;
use serde::Deserialize;
use serde::Serialize;

use crate::normalize::ScriptNormalizer;
use crate::Detect;
use crate::EncodingDetector;
use crate::EncodingSelection;
use crate::FixError;
use crate::FixStatus;
use crate::FixedRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixOptions {
    pub encoding: EncodingSelection,
    /// Convert Traditional Chinese to Simplified after decoding.
    pub simplify: bool,
}

/// Counts for one [`Fixer::fix_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub fixed: usize,
    /// Fixed, but from the lenient fallback.
    pub flagged: usize,
    pub failed: usize,
    /// Already fixed before the pass.
    pub skipped: usize,
}

/// Drives records through detection and optional normalization.
pub struct Fixer<D = EncodingDetector> {
    detector: D,
    normalizer: Option<Box<dyn ScriptNormalizer>>,
}

impl Fixer<EncodingDetector> {
    pub fn new() -> Self {
        Fixer::with_detector(EncodingDetector::new())
    }
}

impl Default for Fixer<EncodingDetector> {
    fn default() -> Self {
        Fixer::new()
    }
}

impl<D: Detect> Fixer<D> {
    pub fn with_detector(detector: D) -> Self {
        Fixer {
            detector,
            normalizer: None,
        }
    }

    pub fn normalizer(mut self, normalizer: Box<dyn ScriptNormalizer>) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    /// Runs one fix attempt. A record already `Processing` is refused.
    ///
    /// Fixed and errored records may be fixed again, typically with a
    /// manual selection after the automatic pass left them flagged.
    pub fn fix(&self, record: &mut FixedRecord, selection: EncodingSelection) -> Result<(), FixError> {
        if record.status == FixStatus::Processing {
            return Err(FixError::Busy(record.id().to_string()));
        }
        record.status = FixStatus::Processing;
        debug!("fixing {} ({})", record.raw().name(), selection);

        let detection = match selection {
            EncodingSelection::Auto => self.detector.detect(record.raw().bytes()),
            EncodingSelection::Manual(candidate) => {
                EncodingDetector::new().detect_as(record.raw().bytes(), candidate)
            }
        };
        record.normalized = self
            .normalizer
            .as_ref()
            .map(|normalizer| normalizer.normalize(&detection.text));
        debug!(
            "{}: {} -> utf-8{}",
            record.raw().name(),
            detection.encoding,
            if detection.possibly_garbled {
                " (possibly garbled)"
            } else {
                ""
            }
        );
        record.detection = Some(detection);
        record.error = None;
        record.status = FixStatus::Fixed;
        Ok(())
    }

    /// Like [`fix`](Self::fix) but parses a label, recording a bad one on
    /// the record instead of returning it.
    ///
    /// A record that is already fixed keeps its previous result and only
    /// gains the error message.
    pub fn fix_labeled(&self, record: &mut FixedRecord, label: &str) -> FixStatus {
        match label.parse::<EncodingSelection>() {
            Ok(selection) => {
                if let Err(e) = self.fix(record, selection) {
                    debug!("{}", e);
                }
            }
            Err(e) => {
                debug!("{}: {}", record.raw().name(), e);
                record.error = Some(e.to_string());
                if record.status != FixStatus::Fixed {
                    record.status = FixStatus::Error;
                }
            }
        }
        record.status
    }

    fn fix_one(&self, record: &mut FixedRecord) -> Outcome {
        if record.status == FixStatus::Fixed {
            return Outcome::Skipped;
        }
        match self.fix(record, EncodingSelection::Auto) {
            Ok(()) if record.possibly_garbled() => Outcome::Flagged,
            Ok(()) => Outcome::Fixed,
            Err(e) => {
                debug!("{}", e);
                Outcome::Failed
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Fixed,
    Flagged,
    Failed,
    Skipped,
}

impl BatchSummary {
    fn add(mut self, outcome: Outcome) -> Self {
        match outcome {
            Outcome::Fixed => self.fixed += 1,
            Outcome::Flagged => {
                self.fixed += 1;
                self.flagged += 1;
            }
            Outcome::Failed => self.failed += 1,
            Outcome::Skipped => self.skipped += 1,
        }
        self
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "multithreading")] {
        use rayon::prelude::*;

        impl<D: Detect + Sync> Fixer<D> {
            /// Auto-fixes every record not already fixed, in parallel.
            pub fn fix_all(&self, records: &mut [FixedRecord]) -> BatchSummary {
                let summary = records
                    .par_iter_mut()
                    .map(|record| self.fix_one(record))
                    .fold(BatchSummary::default, BatchSummary::add)
                    .reduce(BatchSummary::default, |a, b| BatchSummary {
                        fixed: a.fixed + b.fixed,
                        flagged: a.flagged + b.flagged,
                        failed: a.failed + b.failed,
                        skipped: a.skipped + b.skipped,
                    });
                info!("{:?}", summary);
                summary
            }
        }
    } else {
        impl<D: Detect> Fixer<D> {
            /// Auto-fixes every record not already fixed.
            pub fn fix_all(&self, records: &mut [FixedRecord]) -> BatchSummary {
                let summary = records
                    .iter_mut()
                    .map(|record| self.fix_one(record))
                    .fold(BatchSummary::default(), BatchSummary::add);
                info!("{:?}", summary);
                summary
            }
        }
    }
}

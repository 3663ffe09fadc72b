//! Frame processor.
//!
//! Only every second frame is analysed. The cadence starts on `Process`, flips
//! after every call whatever happened, and `Skip` calls hand back the result
//! cached by the last processed frame without touching the detector.

use anyhow::Result;

use crate::detect::FaceBackend;
use crate::error::FacelinkError;
use crate::frame::{BoundingBox, Frame, Resolution, WORKING_RESOLUTION};
use crate::registry::KnownSet;

/// Label given to faces that match no known identity.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Two-phase processing cadence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cadence {
    Process,
    Skip,
}

impl Cadence {
    pub fn next(self) -> Self {
        match self {
            Cadence::Process => Cadence::Skip,
            Cadence::Skip => Cadence::Process,
        }
    }
}

/// Face locations (at working resolution) and their labels, index-aligned.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameResult {
    pub locations: Vec<BoundingBox>,
    pub names: Vec<String>,
}

impl FrameResult {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BoundingBox, &str)> {
        self.locations
            .iter()
            .zip(self.names.iter().map(String::as_str))
    }
}

/// Outcome of one `step`: which phase ran and the result to render.
#[derive(Debug)]
pub struct Step<'a> {
    pub phase: Cadence,
    pub result: &'a FrameResult,
}

impl Step<'_> {
    pub fn processed(&self) -> bool {
        self.phase == Cadence::Process
    }
}

pub struct FrameProcessor {
    cadence: Cadence,
    cached: FrameResult,
    working: Resolution,
}

impl FrameProcessor {
    pub fn new(working: Resolution) -> Self {
        Self {
            cadence: Cadence::Process,
            cached: FrameResult::default(),
            working,
        }
    }

    pub fn working_resolution(&self) -> Resolution {
        self.working
    }

    /// Phase the next call to `step` will run.
    pub fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// Result cached by the most recent processed frame.
    pub fn cached(&self) -> &FrameResult {
        &self.cached
    }

    /// Analyse or skip `frame` according to the cadence.
    ///
    /// A detector failure clears the cache so stale boxes are not carried into the
    /// following skip frame, and surfaces as a `Detection` error.
    pub fn step(
        &mut self,
        frame: &Frame,
        known: &KnownSet,
        backend: &mut dyn FaceBackend,
    ) -> Result<Step<'_>> {
        let phase = self.cadence;
        self.cadence = phase.next();

        if phase == Cadence::Process {
            match self.analyse(frame, known, backend) {
                Ok(result) => self.cached = result,
                Err(e) => {
                    self.cached = FrameResult::default();
                    return Err(FacelinkError::Detection(format!("{:#}", e)).into());
                }
            }
        }

        Ok(Step {
            phase,
            result: &self.cached,
        })
    }

    fn analyse(
        &self,
        frame: &Frame,
        known: &KnownSet,
        backend: &mut dyn FaceBackend,
    ) -> Result<FrameResult> {
        let small = frame.resize(self.working)?.into_rgb();
        let locations = backend.locate_faces(&small)?;

        let mut names = Vec::with_capacity(locations.len());
        for location in &locations {
            let embedding = backend.embed(&small, location)?;
            let matches = backend.matches(known.embeddings(), &embedding);
            let name = known.first_match(&matches).unwrap_or(UNKNOWN_LABEL);
            names.push(name.to_string());
        }

        Ok(FrameResult { locations, names })
    }
}

impl Default for FrameProcessor {
    fn default() -> Self {
        Self::new(WORKING_RESOLUTION)
    }
}

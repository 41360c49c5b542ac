//! Single stdin-to-stdout invocation
//!
//! One call loads the model, reads the whole input, removes the background
//! and writes the encoded result. Stages run strictly in order; the first
//! failure ends the invocation and nothing is written to the output.

use crate::{
    error::{BgRemovalError, Result},
    processor::BackgroundRemovalProcessor,
    services::{ImageIOService, OutputFormatHandler},
    types::ProcessingTimings,
};
use instant::Instant;
use serde::Serialize;
use std::io::{Read, Write};
use tracing::{debug, info};

/// Stages of one invocation, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum InvocationStage {
    Start,
    ModelLoaded,
    InputRead,
    Processed,
    OutputWritten,
}

impl std::fmt::Display for InvocationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::ModelLoaded => "model loaded",
            Self::InputRead => "input read",
            Self::Processed => "processed",
            Self::OutputWritten => "output written",
        };
        f.write_str(name)
    }
}

/// Summary of a successful invocation
#[derive(Debug, Clone, Serialize)]
pub struct InvocationReport {
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub dimensions: (u32, u32),
    /// False when matting was off or fell back to the plain cutout
    pub matting_applied: bool,
    pub timings: ProcessingTimings,
}

/// Error together with the last stage that completed before it
#[derive(Debug)]
pub struct InvocationFailure {
    pub stage: InvocationStage,
    pub error: BgRemovalError,
}

impl std::fmt::Display for InvocationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for InvocationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<InvocationFailure> for BgRemovalError {
    fn from(failure: InvocationFailure) -> Self {
        failure.error
    }
}

struct StageTracker {
    stage: InvocationStage,
}

impl StageTracker {
    fn advance(&mut self, next: InvocationStage) {
        debug!(from = %self.stage, to = %next, "Invocation stage");
        self.stage = next;
    }

    fn fail(&self, error: BgRemovalError) -> InvocationFailure {
        debug!(stage = %self.stage, kind = %error.kind(), "Invocation failed");
        InvocationFailure {
            stage: self.stage,
            error,
        }
    }
}

/// Run one invocation: load model, read `reader` fully, process, write to `writer`
///
/// The output is encoded completely before the first byte is written, so a
/// failure leaves `writer` untouched.
///
/// # Errors
/// - Model resolution or session creation failures
/// - Empty or undecodable input
/// - Inference or matting failures
/// - Encoding or write failures
pub fn invoke<R: Read, W: Write>(
    processor: &mut BackgroundRemovalProcessor,
    reader: R,
    writer: W,
) -> std::result::Result<InvocationReport, InvocationFailure> {
    let mut tracker = StageTracker {
        stage: InvocationStage::Start,
    };
    let start = Instant::now();

    processor.initialize().map_err(|e| tracker.fail(e))?;
    tracker.advance(InvocationStage::ModelLoaded);

    let input = ImageIOService::read_input(reader).map_err(|e| tracker.fail(e))?;
    tracker.advance(InvocationStage::InputRead);

    let result = processor.process_bytes(&input).map_err(|e| tracker.fail(e))?;
    let output_format = processor.config().output_format;
    let encode_start = Instant::now();
    let encoded = OutputFormatHandler::encode(&result.image, output_format).map_err(|e| tracker.fail(e))?;
    let encode_ms = encode_start.elapsed().as_millis() as u64;
    tracker.advance(InvocationStage::Processed);

    let output_bytes = ImageIOService::write_output(writer, &encoded).map_err(|e| tracker.fail(e))?;
    tracker.advance(InvocationStage::OutputWritten);

    let mut timings = result.timings;
    timings.encode_ms = encode_ms;
    timings.total_ms = start.elapsed().as_millis() as u64;

    info!(
        input_bytes = input.len(),
        output_bytes,
        width = result.original_dimensions.0,
        height = result.original_dimensions.1,
        matting_applied = result.matting_applied,
        "Background removed: {}",
        timings.summary()
    );

    Ok(InvocationReport {
        input_bytes: input.len(),
        output_bytes,
        dimensions: result.original_dimensions,
        matting_applied: result.matting_applied,
        timings,
    })
}

/// [`invoke`] with the failure stage folded into the error
///
/// # Errors
/// See [`invoke`].
pub fn run<R: Read, W: Write>(
    processor: &mut BackgroundRemovalProcessor,
    reader: R,
    writer: W,
) -> Result<InvocationReport> {
    invoke(processor, reader, writer).map_err(BgRemovalError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(InvocationStage::Start < InvocationStage::ModelLoaded);
        assert!(InvocationStage::ModelLoaded < InvocationStage::InputRead);
        assert!(InvocationStage::InputRead < InvocationStage::Processed);
        assert!(InvocationStage::Processed < InvocationStage::OutputWritten);
        assert_eq!(InvocationStage::InputRead.to_string(), "input read");
    }

    #[test]
    fn test_failure_carries_stage() {
        let tracker = StageTracker {
            stage: InvocationStage::ModelLoaded,
        };
        let failure = tracker.fail(BgRemovalError::EmptyInput);
        assert_eq!(failure.stage, InvocationStage::ModelLoaded);
        assert_eq!(failure.to_string(), "No image data received");

        let error: BgRemovalError = failure.into();
        assert!(matches!(error, BgRemovalError::EmptyInput));
    }
}

//! The dispatch engine: tries converters against stream guesses until one
//! succeeds.
//!
//! Guesses form the outer loop and registry entries the inner one, so a
//! lower-priority converter matching the first guess beats a higher-priority
//! converter that only matches a later guess. The stream is rewound to its
//! start before every `accepts` and `convert` call, and panics inside
//! converters are contained and recorded like ordinary failures.

use std::any::Any;
use std::io::{Seek, SeekFrom};
use std::panic::{AssertUnwindSafe, catch_unwind};

use tracing::{debug, info, instrument, warn};

use markitup_shared::{
    AttemptOutcome, ConversionCause, ConversionError, ConversionResult, FailedAttempt,
    MarkItUpError, ReadSeek, Result, StreamInfo,
};

use crate::registry::ConverterRegistry;

/// What the engine has learned about one converter during a call.
#[derive(Default)]
struct Tally {
    guesses_tried: usize,
    last_guess: Option<StreamInfo>,
    failure: Option<(StreamInfo, AttemptOutcome)>,
    disabled: bool,
}

impl Tally {
    /// Keep the first hard failure; later ones add nothing.
    fn fail(&mut self, guess: &StreamInfo, outcome: AttemptOutcome) {
        if self.failure.is_none() {
            self.failure = Some((guess.clone(), outcome));
        }
    }
}

/// Convert `input` with the first converter that accepts a guess and
/// succeeds.
///
/// On failure the stream is left at its start offset and the error carries
/// one [`FailedAttempt`] per converter that was consulted. An empty `guesses`
/// slice is treated as a single empty guess.
#[instrument(skip_all, fields(guesses = guesses.len(), converters = registry.len()))]
pub fn dispatch(
    registry: &ConverterRegistry,
    input: &mut dyn ReadSeek,
    guesses: &[StreamInfo],
) -> Result<ConversionResult> {
    let fallback = [StreamInfo::default()];
    let guesses = if guesses.is_empty() { &fallback[..] } else { guesses };

    let start = input.stream_position()?;
    let entries = registry.ordered();
    let mut tallies: Vec<Tally> = entries.iter().map(|_| Tally::default()).collect();

    for (guess_index, guess) in guesses.iter().enumerate() {
        for (entry, tally) in entries.iter().zip(tallies.iter_mut()) {
            if tally.disabled {
                continue;
            }
            let converter = entry.converter();
            let name = converter.name();
            tally.guesses_tried += 1;
            tally.last_guess = Some(guess.clone());

            input.seek(SeekFrom::Start(start))?;
            let accepted = match catch_unwind(AssertUnwindSafe(|| converter.accepts(&mut *input, guess))) {
                Ok(accepted) => accepted,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(converter = name, %message, "accepts panicked; skipping converter");
                    tally.fail(guess, AttemptOutcome::AcceptsPanicked { message });
                    tally.disabled = true;
                    continue;
                }
            };
            if !accepted {
                debug!(converter = name, guess = guess_index, "declined");
                continue;
            }

            input.seek(SeekFrom::Start(start))?;
            let outcome = catch_unwind(AssertUnwindSafe(|| converter.convert(&mut *input, guess)))
                .unwrap_or_else(|payload| {
                    Err(ConversionError::new(
                        name,
                        ConversionCause::Panicked(panic_message(payload.as_ref())),
                    ))
                });

            match outcome {
                Ok(result) => {
                    info!(
                        converter = name,
                        guess = guess_index,
                        mime = guess.mime_type.as_deref().unwrap_or("-"),
                        extension = guess.extension.as_deref().unwrap_or("-"),
                        "converted"
                    );
                    return Ok(result.with_stream_info(guess.clone()));
                }
                Err(err) => {
                    debug!(converter = name, guess = guess_index, error = %err, "conversion failed");
                    tally.fail(guess, AttemptOutcome::ConvertFailed(err));
                }
            }
        }
    }

    input.seek(SeekFrom::Start(start))?;
    let attempts: Vec<FailedAttempt> = entries
        .iter()
        .zip(tallies)
        .filter(|(_, tally)| tally.guesses_tried > 0)
        .map(|(entry, tally)| {
            let (stream_info, outcome) = tally.failure.unwrap_or_else(|| {
                (tally.last_guess.unwrap_or_default(), AttemptOutcome::Declined)
            });
            FailedAttempt {
                converter: entry.name().to_string(),
                guesses_tried: tally.guesses_tried,
                stream_info,
                outcome,
            }
        })
        .collect();

    warn!(candidates = attempts.len(), "no converter succeeded");
    Err(MarkItUpError::UnsupportedFormat { attempts })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

//! Background slicing.
//!
//! A dispatch spawns one thread that runs the whole slicing loop and answers with exactly one
//! message: the complete slice list or a single error. Each job carries a generation token so the
//! owner can discard answers from runs it has since abandoned. There is no cancellation; an
//! abandoned job runs to completion and its answer is dropped.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::anyhow;
use crossbeam_channel::{Receiver, TryRecvError, bounded};
use tracing::{debug, warn};

use crate::codec::DecodedImage;
use crate::error::Error;
use crate::pipeline::{EncodedSlice, SliceOptions, slice_image};
use crate::types::RequestToken;

pub type SliceResult = Result<Vec<EncodedSlice>, Error>;

/// Answer of a finished job.
#[derive(Debug)]
pub struct JobOutcome {
    pub token: RequestToken,
    pub elapsed: Duration,
    pub result: SliceResult,
}

/// Handle to one in-flight slicing run.
#[derive(Debug)]
pub struct SliceJob {
    token: RequestToken,
    started: Instant,
    receiver: Receiver<SliceResult>,
    thread: Option<JoinHandle<()>>,
}

impl SliceJob {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    /// Block until the worker answers.
    pub fn wait(mut self) -> JobOutcome {
        let result = self.receiver.recv().unwrap_or_else(|_| Err(worker_vanished()));
        self.finish(result)
    }

    /// Poll for the answer without blocking.
    pub fn try_finish(&mut self) -> Option<JobOutcome> {
        let result = match self.receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err(worker_vanished()),
        };
        Some(self.finish(result))
    }

    fn finish(&mut self, result: SliceResult) -> JobOutcome {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(target: "worker", token = self.token.as_u64(), "slicing thread panicked");
            }
        }
        JobOutcome { token: self.token, elapsed: self.started.elapsed(), result }
    }
}

/// Spawns slicing jobs and allocates their generation tokens.
#[derive(Debug, Default)]
pub struct SliceWorker {
    next_token: u64,
}

impl SliceWorker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start slicing `image` on a background thread.
    pub fn dispatch(
        &mut self,
        image: Arc<DecodedImage>,
        options: SliceOptions,
    ) -> Result<SliceJob, Error> {
        let token = self.allocate_token();
        let (sender, receiver) = bounded(1);

        let thread = thread::Builder::new()
            .name(format!("shotslice-slicer-{}", token.as_u64()))
            .spawn(move || {
                let result = slice_image(&image, &options).map_err(Error::Processing);
                // The receiver may be gone if the owner abandoned this run.
                let _ = sender.send(result);
            })
            .map_err(|err| Error::Processing(anyhow!("failed to spawn slicing thread: {err}")))?;

        debug!(
            target: "worker",
            token = token.as_u64(),
            slice_height = options.slice_height,
            "dispatched slicing job"
        );

        Ok(SliceJob { token, started: Instant::now(), receiver, thread: Some(thread) })
    }

    fn allocate_token(&mut self) -> RequestToken {
        self.next_token = self.next_token.wrapping_add(1).max(1);
        RequestToken::new(self.next_token)
    }
}

fn worker_vanished() -> Error {
    Error::Processing(anyhow!("slicing worker exited without a result"))
}

//! Station abstraction and the thread runner shared by workers and writer.

use crate::pipeline::error::{ErrorReporter, StationError};
use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A processing station in the pipeline.
///
/// Each station receives input, processes it, and produces output.
/// Stations run in their own threads and are connected by channels.
pub trait Station: Send + 'static {
    /// The input type this station receives.
    type Input: Send + 'static;
    /// The output type this station produces.
    type Output: Send + 'static;

    /// Processes a single input item.
    ///
    /// Returns:
    /// - `Ok(Some(output))` - Successfully processed and produced output
    /// - `Ok(None)` - Successfully processed but no output
    /// - `Err(StationError)` - Processing failed
    fn process(&mut self, input: Self::Input) -> Result<Option<Self::Output>, StationError>;

    /// Returns the name of this station for logging and error reporting.
    fn name(&self) -> &'static str;

    /// Called once the input channel is closed and drained.
    fn shutdown(&mut self) {}
}

/// Runs a station in a dedicated thread.
///
/// Several runners may share one input receiver; each item goes to exactly
/// one of them. A runner stops when its input channel is closed and empty,
/// or on a fatal error. Dropping the station drops its output sender, so the
/// downstream channel closes once every upstream runner has stopped.
pub struct StationRunner<S: Station> {
    handle: Option<JoinHandle<()>>,
    station_name: &'static str,
    _phantom: PhantomData<S>,
}

impl<S: Station> StationRunner<S> {
    /// Spawns a new station in a dedicated thread.
    ///
    /// # Arguments
    /// * `station` - The station implementation to run
    /// * `input_rx` - Channel to receive inputs from
    /// * `output_tx` - Channel to send outputs to
    /// * `error_reporter` - Reporter for handling errors
    pub fn spawn(
        mut station: S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        let station_name = station.name();

        let handle = thread::spawn(move || {
            Self::run_station(&mut station, input_rx, output_tx, error_reporter);
        });

        Self {
            handle: Some(handle),
            station_name,
            _phantom: PhantomData,
        }
    }

    fn run_station(
        station: &mut S,
        input_rx: Receiver<S::Input>,
        output_tx: Sender<S::Output>,
        error_reporter: Arc<dyn ErrorReporter>,
    ) {
        let station_name = station.name();

        while let Ok(input) = input_rx.recv() {
            match station.process(input) {
                Ok(Some(output)) => {
                    if output_tx.send(output).is_err() {
                        // Downstream is gone, nothing left to do.
                        break;
                    }
                }
                Ok(None) => {}
                Err(error @ StationError::Recoverable(_)) => {
                    error_reporter.report(station_name, &error);
                }
                Err(error @ StationError::Fatal(_)) => {
                    error_reporter.report(station_name, &error);
                    break;
                }
            }
        }

        station.shutdown();
    }

    /// Waits for the station thread to complete.
    ///
    /// A panic inside the station is returned as an error message.
    pub fn join(mut self) -> Result<(), String> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| {
                format!(
                    "Station '{}' thread panicked: {}",
                    self.station_name,
                    panic_message(payload.as_ref())
                )
            }),
            None => Ok(()),
        }
    }

    /// Returns the name of the station.
    pub fn name(&self) -> &'static str {
        self.station_name
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

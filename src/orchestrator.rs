use std::ops::ControlFlow;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregator::ResultAggregator;
use crate::api_client::FinesApiClient;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::location::{ConfiguredLocation, LocationCache, LocationProvider};
use crate::models::{CheckRequest, CheckResponse, MunicipalityResult, Summary};
use crate::stream_parser::{consume_response, StreamEnd, StreamHandler};

/// Where the orchestrator is in the life of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckPhase {
    Idle,
    InProgress,
    Completed,
    /// The check ended with the contained user-facing message.
    Failed(String),
}

/// Drives one check at a time from submission to a terminal [`CheckResponse`].
///
/// Checks take `&mut self`, so a new check cannot start while another is
/// running on the same orchestrator. Dropping a check's future drops the
/// response body, which aborts the underlying HTTP request.
pub struct CheckOrchestrator {
    client: FinesApiClient,
    location: LocationCache,
    stream_timeout: Option<Duration>,
    aggregator: ResultAggregator,
    phase: CheckPhase,
    response: Option<CheckResponse>,
}

impl CheckOrchestrator {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self::with_parts(
            FinesApiClient::from_config(config)?,
            ConfiguredLocation::new(config.location),
            config.stream_timeout,
        ))
    }

    pub fn with_parts(
        client: FinesApiClient,
        location: impl LocationProvider + 'static,
        stream_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            location: LocationCache::new(location),
            stream_timeout,
            aggregator: ResultAggregator::new(),
            phase: CheckPhase::Idle,
            response: None,
        }
    }

    pub fn client(&self) -> &FinesApiClient {
        &self.client
    }

    pub fn phase(&self) -> &CheckPhase {
        &self.phase
    }

    pub fn is_in_progress(&self) -> bool {
        self.phase == CheckPhase::InProgress
    }

    /// Response of the last completed check.
    pub fn response(&self) -> Option<&CheckResponse> {
        self.response.as_ref()
    }

    /// Results received so far in the current or last check.
    pub fn partial_results(&self) -> &[MunicipalityResult] {
        self.aggregator.snapshot()
    }

    /// Clears all state from the previous check.
    pub fn reset(&mut self) {
        self.aggregator.clear();
        self.response = None;
        self.phase = CheckPhase::Idle;
    }

    /// Runs a streaming check and returns the final response.
    pub async fn run_check(
        &mut self,
        id_number: &str,
        car_number: &str,
    ) -> Result<CheckResponse, AppError> {
        self.run_check_with(id_number, car_number, |_| {}).await
    }

    /// Runs a streaming check, calling `on_progress` for each result as it arrives.
    ///
    /// The check ends when the server sends `done` (its summary is used
    /// verbatim) or when the stream closes without one (the summary is tallied
    /// locally from the results received).
    pub async fn run_check_with<F>(
        &mut self,
        id_number: &str,
        car_number: &str,
        on_progress: F,
    ) -> Result<CheckResponse, AppError>
    where
        F: FnMut(&MunicipalityResult),
    {
        let request = self.begin(id_number, car_number);
        let span = tracing::info_span!("check", check_id = %Uuid::new_v4());

        let outcome = match self.stream_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.stream_check(&request, on_progress))
                    .instrument(span)
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(
                            "Check timed out after {:?} with {} results",
                            limit,
                            self.aggregator.len()
                        );
                        Err(AppError::StreamTimeout(limit))
                    }
                }
            }
            None => {
                self.stream_check(&request, on_progress)
                    .instrument(span)
                    .await
            }
        };

        self.finish(outcome)
    }

    /// Runs a check against `/check` and waits for the whole response.
    pub async fn run_blocking_check(
        &mut self,
        id_number: &str,
        car_number: &str,
    ) -> Result<CheckResponse, AppError> {
        let request = self.begin(id_number, car_number);
        let span = tracing::info_span!("check", check_id = %Uuid::new_v4());

        let outcome = self.client.check(&request).instrument(span).await;
        if let Ok(response) = &outcome {
            for result in &response.results {
                self.aggregator.add(result.clone());
            }
        }

        self.finish(outcome)
    }

    fn begin(&mut self, id_number: &str, car_number: &str) -> CheckRequest {
        self.reset();
        self.phase = CheckPhase::InProgress;
        CheckRequest::new(id_number, car_number, self.location.get())
    }

    fn finish(
        &mut self,
        outcome: Result<CheckResponse, AppError>,
    ) -> Result<CheckResponse, AppError> {
        match outcome {
            Ok(response) => {
                self.phase = CheckPhase::Completed;
                self.response = Some(response.clone());
                Ok(response)
            }
            Err(e) => {
                tracing::error!("Check failed: {}", e);
                self.phase = CheckPhase::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn stream_check<F>(
        &mut self,
        request: &CheckRequest,
        on_progress: F,
    ) -> Result<CheckResponse, AppError>
    where
        F: FnMut(&MunicipalityResult),
    {
        let response = self.client.open_check_stream(request).await?;

        let mut collector = Collector {
            aggregator: &mut self.aggregator,
            on_progress,
            done: None,
        };
        let end = consume_response(response, &mut collector)
            .await
            .context("Check stream interrupted")?;
        let done = collector.done;

        match done {
            Some(summary) => {
                tracing::info!(
                    "Check done: {} clean, {} with fines, {} failed",
                    summary.clean,
                    summary.fine,
                    summary.failed
                );
            }
            None => {
                debug_assert_eq!(end, StreamEnd::Closed);
                tracing::warn!(
                    "Stream closed without completion marker after {} results, tallying locally",
                    self.aggregator.len()
                );
            }
        }

        Ok(self.aggregator.freeze(done))
    }
}

/// Feeds stream events into the aggregator and stops at `done`.
struct Collector<'a, F> {
    aggregator: &'a mut ResultAggregator,
    on_progress: F,
    done: Option<Summary>,
}

impl<F> StreamHandler for Collector<'_, F>
where
    F: FnMut(&MunicipalityResult),
{
    fn on_result(&mut self, result: MunicipalityResult) -> ControlFlow<()> {
        tracing::debug!("{}: {}", result.name, result.status());
        (self.on_progress)(&result);
        self.aggregator.add(result);
        ControlFlow::Continue(())
    }

    fn on_done(&mut self, summary: Summary) -> ControlFlow<()> {
        self.done = Some(summary);
        ControlFlow::Break(())
    }
}

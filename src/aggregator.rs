use std::collections::HashMap;

use crate::models::{CheckResponse, MunicipalityResult, Summary};

/// Collects the results of one check, keyed by municipality name.
///
/// Order is first-arrival order. A later result for a name already seen
/// replaces the earlier one in place.
#[derive(Debug, Default, Clone)]
pub struct ResultAggregator {
    results: Vec<MunicipalityResult>,
    index: HashMap<String, usize>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: MunicipalityResult) {
        match self.index.get(&result.name) {
            Some(&slot) => {
                tracing::debug!("Replacing earlier result for {}", result.name);
                self.results[slot] = result;
            }
            None => {
                self.index.insert(result.name.clone(), self.results.len());
                self.results.push(result);
            }
        }
    }

    /// Current results in first-arrival order.
    pub fn snapshot(&self) -> &[MunicipalityResult] {
        &self.results
    }

    /// Tally of the current results by status.
    pub fn summarize(&self) -> Summary {
        let mut summary = Summary::default();
        for result in &self.results {
            summary.record(result.status());
        }
        summary
    }

    /// Freezes the current results into a response.
    ///
    /// An explicit summary from the server wins over the local tally; the
    /// server may count municipalities that never streamed a result.
    pub fn freeze(&self, explicit: Option<Summary>) -> CheckResponse {
        let local = self.summarize();
        let summary = match explicit {
            Some(server) => {
                if server != local {
                    tracing::debug!(
                        "Server summary {:?} differs from local tally {:?}, using server's",
                        server,
                        local
                    );
                }
                server
            }
            None => local,
        };

        CheckResponse {
            results: self.results.clone(),
            summary,
        }
    }

    pub fn clear(&mut self) {
        self.results.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

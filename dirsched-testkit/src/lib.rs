//! Fixtures and mocks shared by dirsched integration tests and benches.

pub mod fixture;
pub mod job;
pub mod mock;

pub use fixture::TreeFixture;
pub use job::{job_with_cost, jobs_with_costs, run_queue};
pub use mock::{MockScanner, ScanCall};

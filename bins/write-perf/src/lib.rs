pub mod cmd;

pub use cmd::config::{Cli, Effective, RunArgs};
pub use cmd::error::WritePerfError;
pub use cmd::format::{FormattedRow, OUTPUT_SCHEMA, format_record};
pub use cmd::load_test::{LOAD_TEST_ENABLED, LoadTest, Outcome, RunMetrics, execute, load_test_enabled};

/*!
 * Monitoring
 * Tracing setup and completion timing reports
 */

mod tracer;

pub use tracer::{init_tracing, report_completion, CompletionReport};

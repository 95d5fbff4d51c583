// Local crates
use crate::bootstrap::exit_status::ExitStatus;
use crate::instrumentation::tracing::LoggingContext;

// External crates
use anyhow::Result;
use tracing::instrument;

/// Anything able to run the command tree and report success or failure.
///
/// The executor reads process arguments and environment on its own. Any
/// error it returns is treated as a plain failure.
pub trait Execute {
    /// Run to completion, `Err` meaning the process should fail.
    fn execute(&self) -> Result<()>;
}

impl<F> Execute for F
where
    F: Fn() -> Result<()> + ?Sized,
{
    fn execute(&self) -> Result<()> {
        self()
    }
}

/// Process startup: owns the logging context and hands control to an executor.
///
/// `run` consumes the bootstrap, so a context is installed once per process
/// start and stays in effect for every thread until the process exits.
#[derive(Debug)]
pub struct Bootstrap {
    logging: LoggingContext,
}

impl Bootstrap {
    /// Bootstrap that will install `logging` before delegating.
    #[must_use]
    pub fn new(logging: LoggingContext) -> Self {
        Self { logging }
    }

    /// Install logging process-wide, delegate to `executor` and map its outcome.
    ///
    /// The error value is neither inspected nor logged here. Printing it is
    /// the executor's concern. If logging cannot be installed the executor
    /// never runs.
    pub fn run<E: Execute + ?Sized>(self, executor: &E) -> ExitStatus {
        // Held until return, which is the end of the process for `main`
        let _guard = match self.logging.install() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Error: {e}");
                return ExitStatus::Failure;
            }
        };
        finish(executor)
    }
}

fn finish<E: Execute + ?Sized>(executor: &E) -> ExitStatus {
    ExitStatus::from_outcome(&delegate(executor))
}

#[instrument(name = "bootstrap", level = "trace", skip_all)]
fn delegate<E: Execute + ?Sized>(executor: &E) -> Result<()> {
    tracing::trace!("Delegating to command executor");
    executor.execute()
}

mod geneva_error;
mod step_error;

pub use geneva_error::{ExecuteError, GenevaError};
pub use step_error::{StepError, StepErrorKind};

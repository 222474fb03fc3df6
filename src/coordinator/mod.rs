mod mutations;
mod outcome;

pub use mutations::{Coordinator, SaveRequest};
pub use outcome::{Degradation, MutationError, MutationReport};

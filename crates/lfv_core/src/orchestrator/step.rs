//! Pipeline step trait definition.
//!
//! All pipeline steps implement this trait, providing a consistent
//! interface for validation and execution.

use super::errors::StepResult;
use super::types::{RunContext, RunState, StepOutcome};

/// Trait for pipeline steps.
///
/// The pipeline runner calls these methods in order:
///
/// 1. `validate_input` - Check preconditions before execution
/// 2. `execute` - Perform the step's work
/// 3. `validate_output` - Verify the step produced valid output
///
/// # Example
///
/// ```ignore
/// struct AssembleStep;
///
/// impl PipelineStep for AssembleStep {
///     fn name(&self) -> &str { "Assemble" }
///
///     fn validate_input(&self, _ctx: &RunContext) -> StepResult<()> {
///         Ok(())
///     }
///
///     fn execute(&self, ctx: &RunContext, state: &mut RunState) -> StepResult<StepOutcome> {
///         state.timeline = Some(assembler.assemble_to(...)?);
///         Ok(StepOutcome::Success)
///     }
///
///     fn validate_output(&self, _ctx: &RunContext, state: &RunState) -> StepResult<()> {
///         if !state.has_timeline() {
///             return Err(StepError::invalid_output("Timeline not recorded"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait PipelineStep: Send + Sync {
    /// Get the step name (for logging, error context and the manifest).
    fn name(&self) -> &str;

    /// Validate inputs before execution.
    ///
    /// Should check that files exist and that previous steps recorded
    /// what this step needs.
    fn validate_input(&self, ctx: &RunContext) -> StepResult<()>;

    /// Execute the step's main work and record results in `state`.
    ///
    /// Returns `StepOutcome::Skipped` if there is nothing to do (not an error).
    fn execute(&self, ctx: &RunContext, state: &mut RunState) -> StepResult<StepOutcome>;

    /// Validate outputs after `execute` returned `Success`.
    fn validate_output(&self, ctx: &RunContext, state: &RunState) -> StepResult<()>;

    /// Whether this step can be skipped. Default is `false`.
    fn is_optional(&self) -> bool {
        false
    }

    /// Human-readable description of what this step does.
    fn description(&self) -> &str {
        self.name()
    }
}

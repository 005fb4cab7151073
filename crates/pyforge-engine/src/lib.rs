//! pyforge engine: the generate → analyze → repair loop.
//!
//! - **extract**: pull one Python payload out of a model reply
//! - **context**: render user attachments into the prompt's file context
//! - **prompt**: initial and feedback prompts
//! - **controller**: the bounded retry loop over a [`pyforge_core::RunState`]

pub mod context;
pub mod controller;
pub mod extract;
pub mod prompt;

pub use context::{Attachment, NO_FILES_CONTEXT, render_attachments};
pub use controller::{ControllerError, Decision, RetryController, RunObserver, decide};
pub use extract::{ExtractedCode, ExtractionMethod, extract_code};

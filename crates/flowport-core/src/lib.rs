//! Workflow conversion core.
//!
//! Reads an XML workflow definition, rebuilds the parent/child structure of
//! its actions and translates each action into the target format through a
//! text-generation backend ([`llm_backend`]).
//!
//! ```text
//! load_source ─► parse ─► Document + ParentIndex
//!                              │
//!            for each action (document order)
//!                              │
//!      resolve_parent_id ─► extract ─► TranslationEngine::translate
//!                              │
//!                        WorkflowResult ─► save_result
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod hierarchy;
pub mod io;
pub mod pipeline;
pub mod recovery;
pub mod translate;
pub mod tree;

pub use error::{FlowportError, Result};
pub use pipeline::{inspect_workflow, process_workflow, ActionOverview};
pub use translate::{TranslatedAction, TranslationEngine};
pub use tree::{BuildStats, TreeEntry, WorkflowResult};

//! Collaborator interfaces consumed by the workflow.

pub mod generator;
pub mod messenger;
pub mod search;
pub mod store;

pub use generator::TextGenerator;
pub use messenger::Messenger;
pub use search::SearchProvider;
pub use store::CycleStore;

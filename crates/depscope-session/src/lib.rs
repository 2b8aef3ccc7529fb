//! Analysis session: graph builds, cached causal paths and explanations

pub mod explain;
pub mod session;
pub mod snippet;


pub use explain::ExplanationAssembler;
pub use session::Session;
pub use snippet::extract_snippet;

//! Format interpreters (Component D): ADL and MUS/SND byte-stream state
//! machines that drive the OPL engine from an embedded event stream.

pub mod adl;
pub mod mus;
pub mod timbre;

pub use adl::AdlInterpreter;
pub use mus::MusInterpreter;
pub use timbre::{AdlTimbre, MusTimbre};

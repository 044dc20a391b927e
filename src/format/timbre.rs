//! Timbre storage shared by the ADL and MUS interpreters. 28 parameters
//! (2 operators × 14 params each, see `crate::opl`), laid out exactly as
//! `Opl2Engine::set_voice_timbre` expects.

/// An ADL timbre keeps both a "start" copy (restored on rewind) and a
/// live copy (mutated in place by mid-song instrument-patch commands).
#[derive(Debug, Clone)]
pub struct AdlTimbre {
    pub start_params: [u16; 28],
    pub params: [u16; 28],
}

/// A MUS/SND timbre additionally carries the printable name stored in
/// the SND bank, purely for round-trip fidelity; nothing reads it back.
#[derive(Debug, Clone)]
pub struct MusTimbre {
    pub params: [u16; 28],
    pub name: String,
}

//! Static OPL2 tables. These carry the chip's physical register layout
//! and the engine's default timbres; reproduced verbatim, never derived.

pub const OPERATOR_COUNT: usize = 18;
pub const PARAM_COUNT: usize = 14;
pub const PITCH_STEP_COUNT: i32 = 25;
pub const HALF_TONE_COUNT: usize = 12;
pub const NOTE_COUNT: i32 = 96;
pub const MAX_VOLUME: u8 = 127;
pub const MAX_PITCH: u16 = 0x3FFF;
pub const MID_PITCH: i32 = 0x2000;
pub const STANDARD_MID_C: i32 = 60;
pub const OPL_MID_C: i32 = 48;

pub const MELODY_VOICE_COUNT: usize = 9;
pub const MAX_VOICE_COUNT: usize = 11;

pub const VOICE_BASE_DRUM: u8 = 6;
pub const VOICE_SNARE_DRUM: u8 = 7;
pub const VOICE_TOM: u8 = 8;
pub const VOICE_CYMBAL: u8 = 9;
pub const VOICE_HIHAT: u8 = 10;

pub const PITCH_TOM: i32 = 24;
pub const PITCH_TOM_TO_SNARE: i32 = 7;
pub const PITCH_SNARE_DRUM: i32 = PITCH_TOM + PITCH_TOM_TO_SNARE;

/// Operator parameter indices, in fixed order.
pub const PARAM_KEY_SCALE_LEVEL: usize = 0;
pub const PARAM_FREQ_MULTI: usize = 1;
pub const PARAM_FEEDBACK: usize = 2;
pub const PARAM_ATTACK: usize = 3;
pub const PARAM_SUSTAIN: usize = 4;
pub const PARAM_SUSTAINING: usize = 5;
pub const PARAM_DECAY: usize = 6;
pub const PARAM_RELEASE: usize = 7;
pub const PARAM_LEVEL: usize = 8;
pub const PARAM_AM: usize = 9;
pub const PARAM_VIB: usize = 10;
pub const PARAM_KEY_SCALE_RATE: usize = 11;
pub const PARAM_FM: usize = 12;
pub const PARAM_WAVE_SELECT: usize = 13;

/// 0 = modulator, 1 = carrier.
pub const OPERATOR_TYPE: [u8; OPERATOR_COUNT] =
    [0, 0, 0, 1, 1, 1, 0, 0, 0, 1, 1, 1, 0, 0, 0, 1, 1, 1];

/// OPL register-bank byte offset per operator.
pub const OPERATOR_OFFSET: [u8; OPERATOR_COUNT] = [
    0, 1, 2, 3, 4, 5, 8, 9, 10, 11, 12, 13, 16, 17, 18, 19, 20, 21,
];

/// Which voice (0xC0+n feedback/FM register) owns each operator.
pub const OPERATOR_VOICE: [u8; OPERATOR_COUNT] =
    [0, 1, 2, 0, 1, 2, 3, 4, 5, 3, 4, 5, 6, 7, 8, 6, 7, 8];

/// `[operator_index_in_pair][melody_voice]` -> operator number.
pub const VOICE_MELODY_OPERATOR: [[usize; MELODY_VOICE_COUNT]; 2] = [
    [0, 1, 2, 6, 7, 8, 12, 13, 14],
    [3, 4, 5, 9, 10, 11, 15, 16, 17],
];

/// `[operator_index_in_pair][percussion_voice - VOICE_BASE_DRUM]` -> operator
/// number. Hi-hat (index 4) only ever uses the first slot; the second is
/// zero-padded and unused.
pub const VOICE_PERCUSSION_OPERATOR: [[usize; 5]; 2] = [
    [12, 16, 14, 17, 13],
    [15, 0, 0, 0, 0],
];

pub const PERCUSSION_MASKS: [u8; 5] = [0x10, 0x08, 0x04, 0x02, 0x01];

/// Default piano timbre, one row per operator type (modulator, carrier).
pub const PIANO_PARAMS: [[u16; PARAM_COUNT]; 2] = [
    [1, 1, 3, 15, 5, 0, 1, 3, 15, 0, 0, 0, 1, 0],
    [0, 1, 1, 15, 7, 0, 2, 4, 0, 0, 0, 1, 0, 0],
];

pub const BASE_DRUM_PARAMS: [[u16; PARAM_COUNT]; 2] = [
    [0, 0, 0, 10, 4, 0, 8, 12, 11, 0, 0, 0, 1, 0],
    [0, 0, 0, 13, 4, 0, 6, 15, 0, 0, 0, 0, 1, 0],
];

pub const SNARE_DRUM_PARAMS: [u16; PARAM_COUNT] = [0, 12, 0, 15, 11, 0, 8, 5, 0, 0, 0, 0, 0, 0];
pub const TOM_PARAMS: [u16; PARAM_COUNT] = [0, 4, 0, 15, 11, 0, 7, 5, 0, 0, 0, 0, 0, 0];
pub const CYMBAL_PARAMS: [u16; PARAM_COUNT] = [0, 1, 0, 15, 11, 0, 5, 5, 0, 0, 0, 0, 0, 0];
pub const HIHAT_PARAMS: [u16; PARAM_COUNT] = [0, 1, 0, 15, 11, 0, 7, 5, 0, 0, 0, 0, 0, 0];

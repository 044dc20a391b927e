//! The OPL2 programming engine (Component B): a complete AdLib register
//! model. It never touches real hardware — every write goes through a
//! single trap closure, so it composes with any recorder (or nothing at
//! all, in a test) without knowing which.

mod tables;
pub use tables::*;

/// Holds all operator/voice state needed to compute the OPL2 register
/// writes for a high-level call. `F` is the write trap: `(register,
/// value)`. Generic rather than boxed so the common case — a closure
/// capturing a recorder — monomorphizes with no indirection.
pub struct Opl2Engine<F: FnMut(u8, u8)> {
    trap: F,

    tremolo_depth: bool,
    vibrato_depth: bool,
    key_split: bool,
    enable_wave_select: bool,
    percussion_mode: bool,
    percussion_bits: u8,

    pitch_range: u8,
    pitch_range_step: i32,

    voice_note: [u8; MAX_VOICE_COUNT],
    voice_on: [bool; MAX_VOICE_COUNT],
    half_tone_offset: [i32; MAX_VOICE_COUNT],
    /// Row index into `freqs`, replacing the reference's raw pointer.
    freq_ptr: [usize; MAX_VOICE_COUNT],

    operator_volume: [u8; OPERATOR_COUNT],
    operator_params: [[u8; PARAM_COUNT]; OPERATOR_COUNT],

    /// `freqs[pitch_step][half_tone]`, built once at construction.
    freqs: [[u16; HALF_TONE_COUNT]; PITCH_STEP_COUNT as usize],
}

impl<F: FnMut(u8, u8)> Opl2Engine<F> {
    pub fn new(trap: F) -> Self {
        let mut engine = Opl2Engine {
            trap,
            tremolo_depth: false,
            vibrato_depth: false,
            key_split: false,
            enable_wave_select: true,
            percussion_mode: false,
            percussion_bits: 0,
            pitch_range: 1,
            pitch_range_step: PITCH_STEP_COUNT,
            voice_note: [0; MAX_VOICE_COUNT],
            voice_on: [false; MAX_VOICE_COUNT],
            half_tone_offset: [0; MAX_VOICE_COUNT],
            freq_ptr: [0; MAX_VOICE_COUNT],
            operator_volume: [MAX_VOLUME; OPERATOR_COUNT],
            operator_params: [[0; PARAM_COUNT]; OPERATOR_COUNT],
            freqs: [[0; HALF_TONE_COUNT]; PITCH_STEP_COUNT as usize],
        };
        engine.init_freqs();
        engine
    }

    fn emit(&mut self, reg: u8, val: u8) {
        (self.trap)(reg, val);
    }

    /// Resets all state and writes the OPL2 power-on register sequence.
    /// Must be called once before driving the engine from an interpreter.
    pub fn init_opl(&mut self) {
        self.tremolo_depth = false;
        self.vibrato_depth = false;
        self.key_split = false;
        self.enable_wave_select = true;
        self.voice_note = [0; MAX_VOICE_COUNT];
        self.voice_on = [false; MAX_VOICE_COUNT];
        self.init_operator_volumes();
        self.reset_freqs();
        self.set_percussion_mode(false);
        self.set_tremolo_depth(false);
        self.set_vibrato_depth(false);
        self.set_key_split(false);
        for voice in 0..MELODY_VOICE_COUNT as u8 {
            self.voice_off(voice);
        }
        self.set_pitch_range(1);
        self.enable_wave_select(true);
    }

    pub fn set_percussion_mode(&mut self, percussion: bool) {
        if percussion {
            self.voice_off(VOICE_BASE_DRUM);
            self.voice_off(VOICE_SNARE_DRUM);
            self.voice_off(VOICE_TOM);
            self.set_freq(VOICE_TOM, PITCH_TOM, false);
            self.set_freq(VOICE_SNARE_DRUM, PITCH_SNARE_DRUM, false);
        }
        self.percussion_mode = percussion;
        self.percussion_bits = 0;
        self.init_operator_params();
        self.write_tremolo_vibrato_depth_perc_mode();
    }

    pub fn enable_wave_select(&mut self, enable: bool) {
        self.enable_wave_select = enable;
        for i in 0..OPERATOR_COUNT {
            self.emit(0xE0 + OPERATOR_OFFSET[i], 0);
        }
        self.emit(0x01, if enable { 0x20 } else { 0 });
    }

    pub fn set_pitch_range(&mut self, range: u8) {
        self.pitch_range = range.min(12);
        self.pitch_range_step = self.pitch_range as i32 * PITCH_STEP_COUNT;
    }

    pub fn set_tremolo_depth(&mut self, on: bool) {
        self.tremolo_depth = on;
        self.write_tremolo_vibrato_depth_perc_mode();
    }

    pub fn set_vibrato_depth(&mut self, on: bool) {
        self.vibrato_depth = on;
        self.write_tremolo_vibrato_depth_perc_mode();
    }

    pub fn set_key_split(&mut self, on: bool) {
        self.key_split = on;
        self.write_key_split();
    }

    pub fn set_voice_timbre(&mut self, voice: u8, params: &[u16; 28]) {
        let params0 = &params[0..13];
        let params1 = &params[13..26];
        let waves = &params[26..28];
        let voice_perc = voice.saturating_sub(VOICE_BASE_DRUM) as usize;

        if !self.percussion_mode || voice < VOICE_BASE_DRUM {
            if (voice as usize) < MELODY_VOICE_COUNT {
                self.set_operator_params(VOICE_MELODY_OPERATOR[0][voice as usize], params0, waves[0] as u8);
                self.set_operator_params(VOICE_MELODY_OPERATOR[1][voice as usize], params1, waves[1] as u8);
            }
        } else if voice == VOICE_BASE_DRUM {
            self.set_operator_params(VOICE_PERCUSSION_OPERATOR[0][voice_perc], params0, waves[0] as u8);
            self.set_operator_params(VOICE_PERCUSSION_OPERATOR[1][voice_perc], params1, waves[1] as u8);
        } else {
            self.set_operator_params(VOICE_PERCUSSION_OPERATOR[0][voice_perc], params0, waves[0] as u8);
        }
    }

    pub fn set_voice_volume(&mut self, voice: u8, volume: u8) {
        let voice_perc = voice.saturating_sub(VOICE_BASE_DRUM) as usize;
        let oper = if !self.percussion_mode || voice < VOICE_BASE_DRUM {
            VOICE_MELODY_OPERATOR[1][voice as usize]
        } else {
            let pair = if voice == VOICE_BASE_DRUM { 1 } else { 0 };
            VOICE_PERCUSSION_OPERATOR[pair][voice_perc]
        };
        self.operator_volume[oper] = volume.min(MAX_VOLUME);
        self.write_key_scale_level_volume(oper);
    }

    pub fn bend_voice_pitch(&mut self, voice: u8, pitch_bend: u16) {
        if self.percussion_mode && voice > VOICE_BASE_DRUM {
            return;
        }
        self.change_pitch(voice, pitch_bend.min(MAX_PITCH));
        let note = self.voice_note[voice as usize] as i32;
        let on = self.voice_on[voice as usize];
        self.set_freq(voice, note, on);
    }

    pub fn note_on(&mut self, voice: u8, note: u8) {
        let n = (note as i32 - (STANDARD_MID_C - OPL_MID_C)).max(0);
        if self.percussion_mode && voice >= VOICE_BASE_DRUM {
            if voice == VOICE_BASE_DRUM {
                self.set_freq(VOICE_BASE_DRUM, n, false);
            } else if voice == VOICE_TOM {
                self.set_freq(VOICE_TOM, n, false);
                self.set_freq(VOICE_SNARE_DRUM, n + PITCH_TOM_TO_SNARE, false);
            }
            self.percussion_bits |= PERCUSSION_MASKS[(voice - VOICE_BASE_DRUM) as usize];
            self.write_tremolo_vibrato_depth_perc_mode();
        } else {
            self.set_freq(voice, n, true);
        }
    }

    pub fn note_off(&mut self, voice: u8) {
        if self.percussion_mode && voice >= VOICE_BASE_DRUM {
            self.percussion_bits &= !PERCUSSION_MASKS[(voice - VOICE_BASE_DRUM) as usize];
            self.write_tremolo_vibrato_depth_perc_mode();
        } else {
            let note = self.voice_note[voice as usize] as i32;
            self.set_freq(voice, note, false);
        }
    }

    // -- internal register-write helpers, one per OPL register group --

    fn write_key_scale_level_volume(&mut self, oper: usize) {
        let level = self.operator_params[oper][PARAM_LEVEL] as i32 & 0x3F;
        let vol = self.operator_volume[oper] as i32;
        let tmp = (63 - level) * vol;
        let volume = 63 - ((2 * tmp + MAX_VOLUME as i32) / (2 * MAX_VOLUME as i32));
        let key_scale = self.operator_params[oper][PARAM_KEY_SCALE_LEVEL] << 6;
        self.emit(0x40 + OPERATOR_OFFSET[oper], (volume as u8) | key_scale);
    }

    fn write_key_split(&mut self) {
        self.emit(0x08, if self.key_split { 0x40 } else { 0 });
    }

    fn write_feedback_fm(&mut self, oper: usize) {
        if OPERATOR_TYPE[oper] == 1 {
            return;
        }
        let params = &self.operator_params[oper];
        let value = (params[PARAM_FEEDBACK] << 1) | if params[PARAM_FM] != 0 { 0 } else { 1 };
        self.emit(0xC0 + OPERATOR_VOICE[oper], value);
    }

    fn write_attack_decay(&mut self, oper: usize) {
        let params = &self.operator_params[oper];
        let value = (params[PARAM_ATTACK] << 4) | (params[PARAM_DECAY] & 0x0F);
        self.emit(0x60 + OPERATOR_OFFSET[oper], value);
    }

    fn write_sustain_release(&mut self, oper: usize) {
        let params = &self.operator_params[oper];
        let value = (params[PARAM_SUSTAIN] << 4) | (params[PARAM_RELEASE] & 0x0F);
        self.emit(0x80 + OPERATOR_OFFSET[oper], value);
    }

    fn write_tremolo_vibrato_sustaining_keyscale_freqmulti(&mut self, oper: usize) {
        let params = &self.operator_params[oper];
        let value = (if params[PARAM_AM] != 0 { 0x80 } else { 0 })
            | (if params[PARAM_VIB] != 0 { 0x40 } else { 0 })
            | (if params[PARAM_SUSTAINING] != 0 { 0x20 } else { 0 })
            | (if params[PARAM_KEY_SCALE_RATE] != 0 { 0x10 } else { 0 })
            | (params[PARAM_FREQ_MULTI] & 0x0F);
        self.emit(0x20 + OPERATOR_OFFSET[oper], value);
    }

    fn write_tremolo_vibrato_depth_perc_mode(&mut self) {
        let value = (if self.tremolo_depth { 0x80 } else { 0 })
            | (if self.vibrato_depth { 0x40 } else { 0 })
            | (if self.percussion_mode { 0x20 } else { 0 })
            | self.percussion_bits;
        self.emit(0xBD, value);
    }

    fn write_wave_select(&mut self, oper: usize) {
        let wave = if self.enable_wave_select {
            self.operator_params[oper][PARAM_WAVE_SELECT] & 0x03
        } else {
            0
        };
        self.emit(0xE0 + OPERATOR_OFFSET[oper], wave);
    }

    fn write_all_params(&mut self, oper: usize) {
        self.write_tremolo_vibrato_depth_perc_mode();
        self.write_key_split();
        self.write_key_scale_level_volume(oper);
        self.write_feedback_fm(oper);
        self.write_attack_decay(oper);
        self.write_sustain_release(oper);
        self.write_tremolo_vibrato_sustaining_keyscale_freqmulti(oper);
        self.write_wave_select(oper);
    }

    fn init_operator_params(&mut self) {
        for i in 0..OPERATOR_COUNT {
            let t = OPERATOR_TYPE[i] as usize;
            let wave = PIANO_PARAMS[t][PARAM_COUNT - 1] as u8;
            self.set_operator_params(i, &PIANO_PARAMS[t], wave);
        }
        if self.percussion_mode {
            self.set_operator_params(12, &BASE_DRUM_PARAMS[0], BASE_DRUM_PARAMS[0][PARAM_COUNT - 1] as u8);
            self.set_operator_params(15, &BASE_DRUM_PARAMS[1], BASE_DRUM_PARAMS[1][PARAM_COUNT - 1] as u8);
            self.set_operator_params(16, &SNARE_DRUM_PARAMS, SNARE_DRUM_PARAMS[PARAM_COUNT - 1] as u8);
            self.set_operator_params(14, &TOM_PARAMS, TOM_PARAMS[PARAM_COUNT - 1] as u8);
            self.set_operator_params(17, &CYMBAL_PARAMS, CYMBAL_PARAMS[PARAM_COUNT - 1] as u8);
            self.set_operator_params(13, &HIHAT_PARAMS, HIHAT_PARAMS[PARAM_COUNT - 1] as u8);
        }
    }

    fn init_operator_volumes(&mut self) {
        self.operator_volume = [MAX_VOLUME; OPERATOR_COUNT];
    }

    fn set_operator_params(&mut self, oper: usize, params: &[u16], wave: u8) {
        for i in 0..(PARAM_COUNT - 1) {
            self.operator_params[oper][i] = params[i] as u8;
        }
        self.operator_params[oper][PARAM_COUNT - 1] = wave & 0x03;
        self.write_all_params(oper);
    }

    fn voice_off(&mut self, voice: u8) {
        self.emit(0xA0 + voice, 0);
        self.emit(0xB0 + voice, 0);
    }

    /// §4.2: reproduce the reference formula exactly, 32-bit signed,
    /// truncating division throughout.
    fn calc_freq(num: i32, denom: i32) -> i32 {
        let freq = ((denom * 100) + 6 * num) * 52088;
        let freq = freq / (denom * 2500);
        (freq * 147456) / 111875
    }

    fn set_freqs_row(&mut self, row: usize, num: i32, denom: i32) {
        let mut val = Self::calc_freq(num, denom);
        self.freqs[row][0] = ((4 + val) >> 3) as u16;
        for k in 1..HALF_TONE_COUNT {
            val = (val * 106) / 100;
            self.freqs[row][k] = ((4 + val) >> 3) as u16;
        }
    }

    fn init_freqs(&mut self) {
        for i in 0..PITCH_STEP_COUNT as usize {
            self.set_freqs_row(i, i as i32 * 4, 100);
        }
        self.reset_freqs();
    }

    fn reset_freqs(&mut self) {
        self.freq_ptr = [0; MAX_VOICE_COUNT];
        self.half_tone_offset = [0; MAX_VOICE_COUNT];
    }

    /// §4.3: pitch-bend mapping.
    fn change_pitch(&mut self, voice: u8, pitch_bend: u16) {
        let amount = ((pitch_bend as i32 - MID_PITCH) * self.pitch_range_step) / MID_PITCH;
        let (full, frac) = if amount >= 0 {
            (amount / PITCH_STEP_COUNT, amount % PITCH_STEP_COUNT)
        } else {
            let a = PITCH_STEP_COUNT - 1 - amount;
            let full = -(a / PITCH_STEP_COUNT);
            let mut frac = (a - PITCH_STEP_COUNT + 1) % PITCH_STEP_COUNT;
            if frac != 0 {
                frac = PITCH_STEP_COUNT - frac;
            }
            (full, frac)
        };
        self.half_tone_offset[voice as usize] = full;
        self.freq_ptr[voice as usize] = frac as usize;
    }

    /// §4.4: emit a note at the OPL layer.
    fn set_freq(&mut self, voice: u8, note: i32, on: bool) {
        self.voice_on[voice as usize] = on;
        self.voice_note[voice as usize] = note as u8;

        let n = (note + self.half_tone_offset[voice as usize]).clamp(0, NOTE_COUNT - 1);
        let freq = self.freqs[self.freq_ptr[voice as usize]][(n % HALF_TONE_COUNT as i32) as usize];

        let mut value = if on { 0x20u8 } else { 0 };
        value |= (((n / HALF_TONE_COUNT as i32) as u8) << 2) | (((freq >> 8) & 0x03) as u8);

        self.emit(0xA0 + voice, (freq & 0xFF) as u8);
        self.emit(0xB0 + voice, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_silent() -> Opl2Engine<impl FnMut(u8, u8)> {
        Opl2Engine::new(|_, _| {})
    }

    #[test]
    fn row_zero_starts_at_343() {
        let engine = new_silent();
        assert_eq!(engine.freqs[0][0], 343);
    }

    #[test]
    fn frequency_rows_increase_monotonically() {
        let engine = new_silent();
        for row in &engine.freqs {
            for w in row.windows(2) {
                assert!(w[1] > w[0], "row not increasing: {row:?}");
            }
        }
    }

    #[test]
    fn pitch_bend_midpoint_is_identity() {
        let mut engine = new_silent();
        engine.set_pitch_range(1);
        engine.change_pitch(0, 0x2000);
        assert_eq!(engine.half_tone_offset[0], 0);
        assert_eq!(engine.freq_ptr[0], 0);
    }

    #[test]
    fn note_on_clamps_low_notes_to_zero() {
        let writes = std::cell::RefCell::new(Vec::new());
        let mut engine = Opl2Engine::new(|r, v| writes.borrow_mut().push((r, v)));
        engine.init_opl();
        writes.borrow_mut().clear();
        engine.note_on(0, 0);
        let a = writes.borrow().clone();

        let writes2 = std::cell::RefCell::new(Vec::new());
        let mut engine2 = Opl2Engine::new(|r, v| writes2.borrow_mut().push((r, v)));
        engine2.init_opl();
        writes2.borrow_mut().clear();
        engine2.note_on(0, 11);
        let b = writes2.borrow().clone();
        assert_eq!(a, b);
    }

    #[test]
    fn set_percussion_mode_silences_base_snare_tom() {
        let writes = std::cell::RefCell::new(Vec::new());
        let mut engine = Opl2Engine::new(|r, v| writes.borrow_mut().push((r, v)));
        engine.init_opl();
        writes.borrow_mut().clear();
        engine.set_percussion_mode(true);
        let log = writes.borrow();
        assert!(log.contains(&(0xA0 + VOICE_BASE_DRUM, 0)));
        assert!(log.contains(&(0xA0 + VOICE_SNARE_DRUM, 0)));
        assert!(log.contains(&(0xA0 + VOICE_TOM, 0)));
    }
}

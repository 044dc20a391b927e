//! ADL native song interpreter (part of Component D): a byte-stream
//! state machine with running delay/command encoding that drives the
//! OPL engine.

use super::timbre::AdlTimbre;
use crate::error::{Error, Result};
use crate::opl::{Opl2Engine, MAX_VOICE_COUNT, MELODY_VOICE_COUNT};
use crate::stream::ReadExt;
use std::io::Cursor;

const SAMPLE_RATE: u32 = 44100;

pub struct AdlInterpreter {
    timbres: Vec<AdlTimbre>,
    song: Vec<u8>,
    pos: usize,
    sound_mode: bool,
    current_instrument: [u8; MAX_VOICE_COUNT],
    modify_instrument: u8,
    ended: bool,
    first: bool,
}

impl AdlInterpreter {
    pub fn new(data: Vec<u8>) -> Result<Self> {
        if data.len() < 60 {
            return Err(Error::format("adl", "file too short (need at least 60 bytes)"));
        }
        let mut cursor = Cursor::new(&data[..]);
        let sound_mode = cursor.read_u8_ctx("adl header")? != 0;
        let timbre_count = cursor.read_u8_ctx("adl header")? as usize + 1;
        let _reserved = cursor.read_u8_ctx("adl header")?;

        let mut timbres = Vec::with_capacity(timbre_count);
        for _ in 0..timbre_count {
            let mut params = [0u16; 28];
            for p in params.iter_mut() {
                *p = cursor.read_u16le_ctx("adl timbre")?;
            }
            timbres.push(AdlTimbre { start_params: params, params });
        }

        let song_start = cursor.position() as usize;
        let song = data[song_start..].to_vec();

        Ok(Self {
            timbres,
            song,
            pos: 0,
            sound_mode,
            current_instrument: [0xFF; MAX_VOICE_COUNT],
            modify_instrument: 0xFF,
            ended: false,
            first: true,
        })
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    /// Reset play position and voice state as the reference's `rewind`
    /// does: percussion mode from `sound_mode`, every timbre restored
    /// from its start copy, instrument 0 loaded on the first
    /// `min(timbre_count, voice_count)` voices at full volume.
    pub fn rewind<F: FnMut(u8, u8)>(&mut self, engine: &mut Opl2Engine<F>) {
        self.pos = 0;
        self.ended = false;
        self.first = true;
        self.modify_instrument = 0xFF;
        engine.set_percussion_mode(self.sound_mode);
        for t in self.timbres.iter_mut() {
            t.params = t.start_params;
        }
        self.current_instrument = [0xFF; MAX_VOICE_COUNT];

        let voice_count = if self.sound_mode { MAX_VOICE_COUNT } else { MELODY_VOICE_COUNT };
        let n = self.timbres.len().min(voice_count);
        for v in 0..n {
            self.set_instrument(v as u8, 0, engine);
            engine.set_voice_volume(v as u8, 127);
        }
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = *self
            .song
            .get(self.pos)
            .ok_or_else(|| Error::format("adl song data", "unexpected end of song data"))?;
        self.pos += 1;
        Ok(b)
    }

    fn set_instrument<F: FnMut(u8, u8)>(&mut self, voice: u8, instrument: u8, engine: &mut Opl2Engine<F>) {
        if instrument as usize >= self.timbres.len() {
            return;
        }
        self.current_instrument[voice as usize] = instrument;
        let params = self.timbres[instrument as usize].params;
        engine.set_voice_timbre(voice, &params);
    }

    /// Drive the engine one poll ahead; returns samples to wait before
    /// the next poll.
    pub fn poll<F: FnMut(u8, u8)>(&mut self, engine: &mut Opl2Engine<F>) -> Result<u32> {
        if self.ended || self.pos >= self.song.len() {
            self.ended = true;
            return Ok(0);
        }

        // The first poll only resynchronizes onto the command stream: it
        // skips a leading byte (two if its high bit is set) and reports no
        // delay. Command dispatch begins on the following poll.
        if self.first {
            self.first = false;
            let b = self.read_byte()?;
            if b & 0x80 != 0 {
                self.pos += 1;
            }
            return Ok(0);
        }

        let cmd = self.read_byte()?;
        if cmd == 0xFF {
            self.ended = true;
            return Ok(0);
        }
        if cmd == 0xFE {
            self.modify_instrument = self.read_byte()?;
        }
        // Not an "else if": 0xFE >= 0xD0, so selecting an instrument to
        // modify and patching one of its params both happen on a 0xFE byte.
        if cmd >= 0xD0 {
            let param_index = self.read_byte()? as usize;
            let value = self.read_byte()?;
            if self.modify_instrument == 0xFF || self.modify_instrument as usize >= self.timbres.len() {
                return Err(Error::format("adl", "instrument patch with no instrument selected"));
            }
            if param_index >= 28 {
                return Err(Error::format("adl", "instrument patch index out of range"));
            }
            let mi = self.modify_instrument as usize;
            self.timbres[mi].params[param_index] = value as u16;
            for v in 0..self.current_instrument.len() {
                if self.current_instrument[v] as usize == mi {
                    let params = self.timbres[mi].params;
                    engine.set_voice_timbre(v as u8, &params);
                }
            }
        } else {
            let voice = cmd & 0x0F;
            match cmd & 0xF0 {
                0x00 => {
                    let note = self.read_byte()?;
                    let volume = self.read_byte()?;
                    engine.set_voice_volume(voice, volume);
                    engine.note_on(voice, note);
                }
                0x80 => engine.note_off(voice),
                0x90 => {
                    let note = self.read_byte()?;
                    engine.note_on(voice, note);
                }
                0xA0 => {
                    let b = self.read_byte()?;
                    engine.bend_voice_pitch(voice, (b as u16) << 7);
                }
                0xB0 => {
                    let vol = self.read_byte()?;
                    engine.set_voice_volume(voice, vol);
                }
                0xC0 => {
                    let inst = self.read_byte()?;
                    self.set_instrument(voice, inst, engine);
                }
                _ => return Err(Error::format("adl", format!("unknown command byte {cmd:#04x}"))),
            }
        }

        let delay_byte = self.read_byte()?;
        let delay: u32 = if delay_byte & 0x80 != 0 {
            let next = self.read_byte()?;
            (((delay_byte & 0x03) as u32) << 8) | next as u32
        } else {
            delay_byte as u32
        };

        Ok(delay * SAMPLE_RATE / 1000)
    }
}

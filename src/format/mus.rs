//! MUS (melody) + SND (timbre bank) interpreter (part of Component D):
//! a MIDI-like running-status byte stream paired with a separate timbre
//! file, driving the OPL engine.

use super::timbre::MusTimbre;
use crate::error::{Error, Result};
use crate::opl::Opl2Engine;
use crate::stream::ReadExt;
use std::io::Cursor;

const SAMPLE_RATE: u32 = 44100;

struct MusHeader {
    ticks_per_beat: u8,
    #[allow(dead_code)] // parsed for round-trip fidelity, never consulted (see spec Open Questions)
    beats_per_measure: u8,
    sound_mode: bool,
    pitch_bend_range: u8,
    base_tempo: u16,
}

pub struct MusInterpreter {
    timbres: Vec<MusTimbre>,
    song: Vec<u8>,
    pos: usize,
    ticks_per_beat: u8,
    base_tempo: u16,
    tempo: u32,
    pitch_bend_range: u8,
    sound_mode: bool,
    last_command: u8,
    ended: bool,
    first: bool,
}

fn parse_snd(data: &[u8]) -> Result<Vec<MusTimbre>> {
    if data.len() <= 6 {
        return Err(Error::format("snd", "file too short"));
    }
    let (major, minor) = (data[0], data[1]);
    if (major, minor) != (1, 0) {
        return Err(Error::format("snd", format!("unsupported version {major}.{minor}")));
    }

    let mut cursor = Cursor::new(data);
    cursor.set_position(2);
    let timbre_count = cursor.read_u16le_ctx("snd header")? as usize;
    let timbre_pos = cursor.read_u16le_ctx("snd header")? as usize;

    let min_timbre_pos = 6 + 9 * timbre_count;
    if timbre_pos < min_timbre_pos {
        return Err(Error::format("snd", "timbre table position too small"));
    }
    if data.len() < timbre_pos {
        return Err(Error::format("snd", "timbre table position past end of file"));
    }
    let remaining = data.len() - timbre_pos;
    if remaining != timbre_count * 56 {
        return Err(Error::format("snd", "timbre parameter size mismatch"));
    }

    let mut names = Vec::with_capacity(timbre_count);
    for _ in 0..timbre_count {
        let raw = cursor.read_exact_vec_ctx(9, "snd timbre name")?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        names.push(String::from_utf8_lossy(&raw[..end]).into_owned());
    }

    let mut params_cursor = Cursor::new(&data[timbre_pos..]);
    let mut timbres = Vec::with_capacity(timbre_count);
    for name in names {
        let mut params = [0u16; 28];
        for p in params.iter_mut() {
            *p = params_cursor.read_u16le_ctx("snd timbre params")?;
        }
        timbres.push(MusTimbre { params, name });
    }
    Ok(timbres)
}

fn parse_mus(data: &[u8]) -> Result<(MusHeader, Vec<u8>)> {
    if data.len() <= 6 {
        return Err(Error::format("mus", "file too short"));
    }
    let (major, minor) = (data[0], data[1]);
    if (major, minor) != (1, 0) {
        return Err(Error::format("mus", format!("unsupported version {major}.{minor}")));
    }

    let mut cursor = Cursor::new(data);
    cursor.set_position(2);
    let _song_id = cursor.read_u32le_ctx("mus header")?;
    let _name = cursor.read_exact_vec_ctx(30, "mus header")?;
    let ticks_per_beat = cursor.read_u8_ctx("mus header")?;
    let beats_per_measure = cursor.read_u8_ctx("mus header")?;
    let _length_in_ticks = cursor.read_exact_vec_ctx(4, "mus header")?;
    let song_data_size = cursor.read_u32le_ctx("mus header")? as usize;
    let _command_count = cursor.read_exact_vec_ctx(4, "mus header")?;
    let _reserved = cursor.read_exact_vec_ctx(8, "mus header")?;
    let sound_mode = cursor.read_u8_ctx("mus header")? != 0;
    let pitch_bend_range = cursor.read_u8_ctx("mus header")?;
    let base_tempo = cursor.read_u16le_ctx("mus header")?;
    let _reserved2 = cursor.read_exact_vec_ctx(8, "mus header")?;

    let header_end = cursor.position() as usize;
    if data.len() < header_end || data.len() - header_end < song_data_size {
        return Err(Error::format("mus", "song data truncated"));
    }
    let song = data[header_end..header_end + song_data_size].to_vec();

    Ok((
        MusHeader {
            ticks_per_beat,
            beats_per_measure,
            sound_mode,
            pitch_bend_range,
            base_tempo,
        },
        song,
    ))
}

impl MusInterpreter {
    pub fn new(mus_data: Vec<u8>, snd_data: Vec<u8>) -> Result<Self> {
        let timbres = parse_snd(&snd_data)?;
        let (header, song) = parse_mus(&mus_data)?;
        Ok(Self {
            timbres,
            song,
            pos: 0,
            ticks_per_beat: header.ticks_per_beat,
            base_tempo: header.base_tempo,
            tempo: header.base_tempo as u32,
            pitch_bend_range: header.pitch_bend_range,
            sound_mode: header.sound_mode,
            last_command: 0,
            ended: false,
            first: true,
        })
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn rewind<F: FnMut(u8, u8)>(&mut self, engine: &mut Opl2Engine<F>) {
        self.pos = 0;
        self.tempo = self.base_tempo as u32;
        self.last_command = 0;
        self.ended = false;
        self.first = true;
        engine.set_percussion_mode(self.sound_mode);
        engine.set_pitch_range(self.pitch_bend_range);
    }

    fn peek_byte(&self) -> Result<u8> {
        self.song
            .get(self.pos)
            .copied()
            .ok_or_else(|| Error::format("mus song data", "unexpected end of song data"))
    }

    fn read_byte(&mut self) -> Result<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Ok(b)
    }

    fn get_sample_delay(&self, delay: u32) -> u32 {
        if delay == 0 {
            return 0;
        }
        let freq = (self.ticks_per_beat as u32 * self.tempo) / 60;
        if freq == 0 {
            return 0;
        }
        (delay * SAMPLE_RATE) / freq
    }

    fn set_instrument<F: FnMut(u8, u8)>(&mut self, voice: u8, instrument: u8, engine: &mut Opl2Engine<F>) {
        if instrument as usize >= self.timbres.len() {
            return;
        }
        let params = self.timbres[instrument as usize].params;
        engine.set_voice_timbre(voice, &params);
    }

    pub fn poll<F: FnMut(u8, u8)>(&mut self, engine: &mut Opl2Engine<F>) -> Result<u32> {
        if self.ended {
            return Ok(0);
        }

        if self.first {
            self.first = false;
            let delay = self.read_byte()? as u32;
            return Ok(self.get_sample_delay(delay));
        }

        let mut delay;
        loop {
            let cmd = self.peek_byte()?;

            if cmd == 0xF8 {
                self.pos += 1;
                delay = 0xF8;
                break;
            }
            if cmd == 0xFC {
                self.ended = true;
                return Ok(0);
            }
            if cmd == 0xF0 {
                self.pos += 1;
                let type1 = self.read_byte()?;
                let type2 = self.read_byte()?;
                if type1 == 0x7F && type2 == 0x00 {
                    let num = self.read_byte()? as u32;
                    let denom = self.read_byte()? as u32;
                    self.tempo = self.base_tempo as u32 * num + ((self.base_tempo as u32 * denom) >> 7);
                    let _ = self.read_byte()?;
                } else {
                    self.pos -= 2;
                    loop {
                        if self.read_byte()? == 0xF7 {
                            break;
                        }
                    }
                }
                delay = self.read_byte()? as u32;
                break;
            }

            let effective_cmd = if cmd >= 0x80 {
                self.pos += 1;
                self.last_command = cmd;
                cmd
            } else {
                self.last_command
            };
            let voice = effective_cmd & 0x0F;
            match effective_cmd & 0xF0 {
                0x80 => {
                    let _ = self.read_byte()?;
                    let _ = self.read_byte()?;
                    engine.note_off(voice);
                }
                0x90 => {
                    let note = self.read_byte()?;
                    let volume = self.read_byte()?;
                    if volume != 0 {
                        engine.set_voice_volume(voice, volume);
                        engine.note_on(voice, note);
                    } else {
                        engine.note_off(voice);
                    }
                }
                0xA0 => {
                    let vol = self.read_byte()?;
                    engine.set_voice_volume(voice, vol);
                }
                0xB0 => {
                    let _ = self.read_byte()?;
                    let _ = self.read_byte()?;
                }
                0xC0 => {
                    let inst = self.read_byte()?;
                    self.set_instrument(voice, inst, engine);
                }
                0xD0 => {
                    let _ = self.read_byte()?;
                }
                0xE0 => {
                    let lo = self.read_byte()? as u16;
                    let hi = self.read_byte()? as u16;
                    let pitch = lo | (hi << 7);
                    engine.bend_voice_pitch(voice, pitch);
                }
                _ => {
                    return Err(Error::format(
                        "mus",
                        format!("unknown command byte {effective_cmd:#04x}"),
                    ))
                }
            }

            delay = self.read_byte()? as u32;
            if delay != 0 {
                break;
            }
        }

        if delay == 0xF8 {
            delay = 240;
            if self.peek_byte()? != 0xF8 {
                delay += self.read_byte()? as u32;
            }
        }

        Ok(self.get_sample_delay(delay))
    }
}

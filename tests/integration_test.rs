//! End-to-end scenarios from the conversion pipeline: ADL and MUS
//! streams in, a complete VGM byte buffer out.

use cokteladl2vgm::{convert_adl, convert_mus};

fn read_u32le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

fn read_u16le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(data[offset..offset + 2].try_into().unwrap())
}

fn one_zero_timbre_adl(song: &[u8]) -> Vec<u8> {
    let mut data = vec![0x00u8, 0x00, 0x00]; // melody mode, 1 timbre, reserved byte
    data.extend(std::iter::repeat(0u8).take(28 * 2)); // one all-zero timbre
    data.extend_from_slice(song);
    data
}

#[test]
fn s1_minimal_adl_has_zero_samples_and_ends_with_end_marker() {
    let data = one_zero_timbre_adl(&[0xFF]);
    let vgm = convert_adl(data).unwrap();

    assert_eq!(&vgm[0..4], b"Vgm ");
    assert_eq!(read_u32le(&vgm, 0x08), 0x150);
    assert_eq!(read_u32le(&vgm, 0x18), 0, "total_samples must be zero");
    assert_eq!(*vgm.last().unwrap(), 0x66);

    let eof = read_u32le(&vgm, 0x04);
    assert_eq!(eof as usize, vgm.len() - 4);
}

#[test]
fn s2_single_note_emits_a_441_sample_wait() {
    // Leading 0x00 is consumed by the first poll's one-byte skip (spec.md
    // §4.7); the real command stream starts with note_on(voice=0, note=60),
    // a 10-tick delay, note_off, end.
    let data = one_zero_timbre_adl(&[0x00, 0x90, 60, 10, 0x80, 0, 0xFF]);
    let vgm = convert_adl(data).unwrap();

    let total_samples = read_u32le(&vgm, 0x18);
    assert_eq!(total_samples, (10 * 44100) / 1000);

    // Every 0x61 wait record in the data region sums to total_samples.
    let data_region = &vgm[0x100..];
    let mut waited = 0u32;
    let mut i = 0;
    while i < data_region.len() {
        match data_region[i] {
            0x5A => i += 3,
            0x61 => {
                waited += read_u16le(data_region, i + 1) as u32;
                i += 3;
            }
            0x66 => break,
            other => panic!("unexpected VGM command byte {other:#04x}"),
        }
    }
    assert_eq!(waited, total_samples);

    // A key-on write (0xB0 register with bit 0x20 set) must appear.
    let mut saw_key_on = false;
    let mut j = 0;
    while j < data_region.len() {
        match data_region[j] {
            0x5A => {
                let (reg, val) = (data_region[j + 1], data_region[j + 2]);
                if (0xB0..=0xB8).contains(&reg) && val & 0x20 != 0 {
                    saw_key_on = true;
                }
                j += 3;
            }
            0x61 => j += 3,
            0x66 => break,
            _ => unreachable!(),
        }
    }
    assert!(saw_key_on, "expected a key-on write for the played note");
}

#[test]
fn s3_pitch_bend_midpoint_is_a_no_op() {
    // note_on(0, 60), bend to 0x2000 (identity), end; leading 0x00 is the
    // first poll's skip byte.
    let data = one_zero_timbre_adl(&[0x00, 0x90, 60, 0, 0xA0, 0x40, 0, 0xFF]);
    let vgm = convert_adl(data).unwrap();
    assert_eq!(*vgm.last().unwrap(), 0x66);
    assert_eq!(read_u32le(&vgm, 0x18), 0);
}

fn snd_with_one_timbre() -> Vec<u8> {
    let mut snd = vec![1u8, 0]; // version 1.0
    snd.extend_from_slice(&1u16.to_le_bytes()); // timbre_count
    snd.extend_from_slice(&15u16.to_le_bytes()); // timbre_pos = 6 + 9*1
    snd.extend_from_slice(b"lead\0\0\0\0\0"); // 9-byte name
    snd.extend(std::iter::repeat(0u8).take(28 * 2)); // 28 zero params
    snd
}

#[test]
fn s4_mus_tempo_change_scales_the_following_delay() {
    let snd = snd_with_one_timbre();

    let mut mus = vec![1u8, 0]; // version
    mus.extend_from_slice(&0u32.to_le_bytes()); // song_id
    mus.extend(std::iter::repeat(0u8).take(30)); // name
    mus.push(24); // ticks_per_beat
    mus.push(4); // beats_per_measure
    mus.extend(std::iter::repeat(0u8).take(4)); // length in ticks
    // Leading byte is the delay consumed by the very first poll (spec.md
    // §4.8: "First poll: consume one delay byte"); the tempo-change
    // global event and its delay are only seen on the second poll.
    let song: Vec<u8> = vec![0x00, 0xF0, 0x7F, 0x00, 2, 0, 0x00, 5, 0xFC];
    mus.extend_from_slice(&(song.len() as u32).to_le_bytes()); // song_data_size
    mus.extend(std::iter::repeat(0u8).take(4)); // command count
    mus.extend(std::iter::repeat(0u8).take(8)); // reserved
    mus.push(0); // sound_mode
    mus.push(0); // pitch_bend_range
    mus.extend_from_slice(&120u16.to_le_bytes()); // base_tempo
    mus.extend(std::iter::repeat(0u8).take(8)); // reserved2
    mus.extend_from_slice(&song);

    let vgm = convert_mus(mus, snd).unwrap();
    // tempo = 120*2 + ((120*0)>>7) = 240; freq = 24*240/60 = 96;
    // samples = 5*44100/96 = 2296 (truncating).
    let total_samples = read_u32le(&vgm, 0x18);
    assert_eq!(total_samples, 2296);
}

#[test]
fn s5_lzss_round_trip_produces_exact_bytes() {
    use cokteladl2vgm::archive::gamedir::unpack;

    let mut payload = 7u32.to_le_bytes().to_vec();
    payload.push(0xFF); // command byte: all 7 decisions are literals
    payload.extend_from_slice(b"Hello!\n");

    let out = unpack(&payload, 1).unwrap();
    assert_eq!(out, b"Hello!\n");
}

#[test]
fn invariant_every_opl_write_has_a_register_in_the_documented_ranges() {
    fn in_range(reg: u8) -> bool {
        matches!(reg, 0x01 | 0x08 | 0xBD)
            || (0x20..=0x35).contains(&reg)
            || (0x40..=0x55).contains(&reg)
            || (0x60..=0x75).contains(&reg)
            || (0x80..=0x95).contains(&reg)
            || (0xA0..=0xA8).contains(&reg)
            || (0xB0..=0xB8).contains(&reg)
            || (0xC0..=0xC8).contains(&reg)
            || (0xE0..=0xF5).contains(&reg)
    }

    // note_on, note_off, set_instrument(0), end; leading 0x00 is the first
    // poll's skip byte, and 0xC0 carries its own instrument byte plus a
    // separate trailing delay byte.
    let data = one_zero_timbre_adl(&[0x00, 0x90, 60, 1, 0x80, 0, 0xC0, 0, 0, 0xFF]);
    let vgm = convert_adl(data).unwrap();
    let data_region = &vgm[0x100..];

    let mut i = 0;
    while i < data_region.len() {
        match data_region[i] {
            0x5A => {
                assert!(in_range(data_region[i + 1]), "register {:#04x} out of range", data_region[i + 1]);
                i += 3;
            }
            0x61 => i += 3,
            0x66 => break,
            other => panic!("unexpected command byte {other:#04x}"),
        }
    }
}

#[test]
fn adl_file_too_short_is_rejected() {
    let err = convert_adl(vec![0u8; 10]).unwrap_err();
    assert!(matches!(err, cokteladl2vgm::Error::Format(_)));
}

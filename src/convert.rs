//! Top-level orchestration: wires an interpreter, the OPL engine, and
//! the VGM recorder together in the cooperative poll loop, and the
//! game-directory crawler that drives the whole pipeline over a game
//! install.

use std::cell::RefCell;
use std::rc::Rc;

use crate::archive::{GameDir, TotFile};
use crate::error::Result;
use crate::format::{AdlInterpreter, MusInterpreter};
use crate::opl::Opl2Engine;
use crate::vgm::VgmWriter;

/// Convert a standalone ADL song stream into a complete VGM byte buffer.
pub fn convert_adl(data: Vec<u8>) -> Result<Vec<u8>> {
    let mut interp = AdlInterpreter::new(data)?;

    let writer = Rc::new(RefCell::new(VgmWriter::new()));
    {
        let trap_writer = Rc::clone(&writer);
        let mut engine = Opl2Engine::new(move |reg, val| {
            trap_writer.borrow_mut().write_opl(reg, val);
        });
        engine.init_opl();
        interp.rewind(&mut engine);

        loop {
            let samples = interp.poll(&mut engine)?;
            if samples > 0 {
                writer.borrow_mut().wait(samples);
            }
            if interp.ended() {
                break;
            }
        }
    }

    let writer = Rc::try_unwrap(writer)
        .unwrap_or_else(|_| unreachable!("engine trap dropped before this point"))
        .into_inner();
    Ok(writer.finish())
}

/// Convert a paired MDY/TBR (or MUS/SND) melody+timbre stream into a
/// complete VGM byte buffer.
pub fn convert_mus(mdy_data: Vec<u8>, tbr_data: Vec<u8>) -> Result<Vec<u8>> {
    let mut interp = MusInterpreter::new(mdy_data, tbr_data)?;

    let writer = Rc::new(RefCell::new(VgmWriter::new()));
    {
        let trap_writer = Rc::clone(&writer);
        let mut engine = Opl2Engine::new(move |reg, val| {
            trap_writer.borrow_mut().write_opl(reg, val);
        });
        engine.init_opl();
        interp.rewind(&mut engine);

        loop {
            let samples = interp.poll(&mut engine)?;
            if samples > 0 {
                writer.borrow_mut().wait(samples);
            }
            if interp.ended() {
                break;
            }
        }
    }

    let writer = Rc::try_unwrap(writer)
        .unwrap_or_else(|_| unreachable!("engine trap dropped before this point"))
        .into_inner();
    Ok(writer.finish())
}

/// One output produced while crawling a game directory: the name the
/// VGM should be written under, and its bytes.
pub struct CrawlOutput {
    pub name: String,
    pub vgm: Vec<u8>,
}

fn change_extension(name: &str, ext: &str) -> String {
    match name.rsplit_once('.') {
        Some((base, _)) => format!("{base}.{ext}"),
        None => format!("{name}.{ext}"),
    }
}

/// Walk a game directory and convert every standalone ADL file, every
/// MDY/TBR pair, and every ADL song embedded in a TOT/EXT bundle.
/// Per-file failures are reported to stderr and skipped; the crawl
/// itself never fails.
pub fn crawl_directory(path: &str) -> Result<Vec<CrawlOutput>> {
    let game_dir = GameDir::open(path)?;
    let mut outputs = Vec::new();

    for adl_name in game_dir.adl_files().to_vec() {
        match game_dir.get_file(&adl_name).and_then(convert_adl) {
            Ok(vgm) => outputs.push(CrawlOutput {
                name: format!("{adl_name}.vgm"),
                vgm,
            }),
            Err(e) => eprintln!("WARNING: converting {adl_name}: {e}"),
        }
    }

    for mdy_name in game_dir.mdy_files().to_vec() {
        let tbr_name = change_extension(&mdy_name, "tbr");
        let result = (|| -> Result<Vec<u8>> {
            let mdy = game_dir.get_file(&mdy_name)?;
            let tbr = game_dir.get_file(&tbr_name)?;
            convert_mus(mdy, tbr)
        })();
        match result {
            Ok(vgm) => outputs.push(CrawlOutput {
                name: format!("{mdy_name}.vgm"),
                vgm,
            }),
            Err(e) => eprintln!("WARNING: converting {mdy_name} with {tbr_name}: {e}"),
        }
    }

    for tot_name in game_dir.tot_files().to_vec() {
        let tot = match TotFile::load(&game_dir, &tot_name) {
            Ok(tot) => tot,
            Err(e) => {
                eprintln!("WARNING: loading TOT {tot_name}: {e}");
                continue;
            }
        };

        for i in 0..tot.tot_resource_count() {
            let name = format!("{}.tot.{}", tot.name(), i);
            match tot.tot_resource(i).and_then(convert_adl) {
                Ok(vgm) => outputs.push(CrawlOutput {
                    name: format!("{name}.vgm"),
                    vgm,
                }),
                Err(e) => eprintln!("WARNING: converting {name}: {e}"),
            }
        }

        for i in 0..tot.ext_resource_count() {
            let name = format!("{}.ext.{}", tot.name(), i);
            match tot.ext_resource(i).and_then(convert_adl) {
                Ok(vgm) => outputs.push(CrawlOutput {
                    name: format!("{name}.vgm"),
                    vgm,
                }),
                Err(e) => eprintln!("WARNING: converting {name}: {e}"),
            }
        }
    }

    Ok(outputs)
}

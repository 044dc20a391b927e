use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use cokteladl2vgm::{convert_adl, convert_mus, crawl_directory, Error};

#[derive(Parser, Debug)]
#[command(name = "cokteladl2vgm")]
#[command(version)]
#[command(about = "Converts Coktel Vision AdLib music to VGM", long_about = None)]
struct Args {
    /// <file.adl>, or <file.mdy> <file.tbr>, or </path/to/game/>
    paths: Vec<PathBuf>,
}

fn output_name(path: &Path) -> PathBuf {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());
    PathBuf::from(format!("{base}.vgm"))
}

/// -1 (invalid command line) vs. -2 (caught conversion error), per
/// spec.md §6's exit code contract.
enum CliError {
    BadUsage(String),
    Conversion(Error),
}

impl From<Error> for CliError {
    fn from(e: Error) -> Self {
        CliError::Conversion(e)
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    match args.paths.as_slice() {
        [single] if single.is_dir() => {
            let outputs = crawl_directory(&single.to_string_lossy())?;
            for output in outputs {
                std::fs::write(&output.name, &output.vgm)
                    .map_err(|e| CliError::Conversion(Error::Write(output.name.clone(), e)))?;
            }
            Ok(())
        }
        [adl] => {
            let data = std::fs::read(adl)
                .map_err(|e| CliError::Conversion(Error::Open(adl.display().to_string(), e)))?;
            let vgm = convert_adl(data)?;
            let out = output_name(adl);
            std::fs::write(&out, &vgm)
                .map_err(|e| CliError::Conversion(Error::Write(out.display().to_string(), e)))?;
            Ok(())
        }
        [mdy, tbr] => {
            let mdy_data = std::fs::read(mdy)
                .map_err(|e| CliError::Conversion(Error::Open(mdy.display().to_string(), e)))?;
            let tbr_data = std::fs::read(tbr)
                .map_err(|e| CliError::Conversion(Error::Open(tbr.display().to_string(), e)))?;
            let vgm = convert_mus(mdy_data, tbr_data)?;
            let out = output_name(mdy);
            std::fs::write(&out, &vgm)
                .map_err(|e| CliError::Conversion(Error::Write(out.display().to_string(), e)))?;
            Ok(())
        }
        _ => Err(CliError::BadUsage(
            "expected <file.adl>, or <file.mdy> <file.tbr>, or </path/to/game/>".to_string(),
        )),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::from(0),
        Err(CliError::BadUsage(msg)) => {
            eprintln!("error: {msg}");
            ExitCode::from(255)
        }
        Err(CliError::Conversion(e)) => {
            eprintln!("error: {e}");
            ExitCode::from(254)
        }
    }
}

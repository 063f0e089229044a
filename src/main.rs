use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use weft::{error, HostInput, RunState};

/// Weft is a small and exact virtual machine for LC3 binary images.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// One or more big-endian `.lc3`/`.obj` images, loaded in order
    image: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.image.is_empty() {
        eprintln!("usage: weft [image-file1] ...");
        return ExitCode::from(2);
    }

    let mut vm = RunState::new(Box::new(HostInput::new()), Box::new(io::stdout()));

    for path in &args.image {
        let (origin, words) = match read_image(path) {
            Ok(image) => image,
            Err(report) => {
                eprintln!("{report:?}");
                return ExitCode::from(1);
            }
        };
        vm.load_image(origin, &words);
        file_message("Loaded", path);
    }

    message("Running", "loaded image");
    if let Err(report) = vm.run() {
        eprintln!("{report:?}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

/// Parse a big-endian image file into its origin and payload words.
fn read_image(path: &Path) -> miette::Result<(u16, Vec<u16>)> {
    let mut file = File::open(path).map_err(|err| error::image_io(path, err))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)
        .map_err(|err| error::image_io(path, err))?;

    if buffer.len() % 2 != 0 {
        return Err(error::image_unaligned(path));
    }

    let mut words = buffer
        .chunks_exact(2)
        .map(|word| u16::from_be_bytes([word[0], word[1]]));
    let Some(origin) = words.next() else {
        return Err(error::image_empty(path));
    };
    Ok((origin, words.collect()))
}

fn file_message(left: &str, right: &Path) {
    message(left, &format!("target {}", right.display()));
}

fn message(left: &str, right: &str) {
    println!("{:>12} {right}", left.green());
}

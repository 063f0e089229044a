use std::io;
use std::path::Path;

use miette::{miette, Report, Severity};

// Image loading errors

pub fn image_io(path: &Path, err: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::io",
        help = "check that the file exists and is readable",
        "Failed to read image file `{}`: {err}",
        path.display(),
    )
}

pub fn image_unaligned(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::align",
        help = "image files are sequences of big-endian 16-bit words",
        "Image file `{}` is not aligned to 16 bits",
        path.display(),
    )
}

pub fn image_empty(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::orig",
        help = "the first word of an image names the address it loads at",
        "Image file `{}` is missing an origin word",
        path.display(),
    )
}

// Runtime errors

pub fn invalid_opcode(addr: u16, instr: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "exec::opcode",
        help = "opcodes 0x8 and 0xD have no defined behavior on this machine",
        "Invalid opcode 0x{:X} in instruction 0x{instr:04X} at address 0x{addr:04X}",
        instr >> 12,
    )
}

pub fn invalid_trap(addr: u16, instr: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "exec::trap",
        help = "service vectors 0x20 through 0x25 are defined",
        "Undefined trap vector 0x{:02X} at address 0x{addr:04X}",
        instr & 0xFF,
    )
}

pub fn output_failure(err: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "exec::output",
        help = "the run cannot continue once the output device fails",
        "Failed to write program output: {err}",
    )
}

pub fn input_failure(err: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "exec::input",
        help = "a blocking character read found no more input",
        "Failed to read program input: {err}",
    )
}

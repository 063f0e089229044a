use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;
use miette::Result;

use crate::device::InputSource;
use crate::error;

/// LC3 can address 128KB of memory.
const MEMORY_MAX: usize = 0x10000;

/// Keyboard status register. Bit 15 is set while a key is waiting to be read.
pub const MR_KBSR: u16 = 0xFE00;
/// Keyboard data register. Holds the byte latched by the last status read.
pub const MR_KBDR: u16 = 0xFE02;

/// Address execution starts from, regardless of where images were loaded.
pub const PC_START: u16 = 0x3000;

/// Represents complete program state during runtime.
///
/// Exclusively owned by the run loop; a host thread can only reach in through
/// the shared stop flag returned by [`RunState::stop_handle`].
pub struct RunState {
    /// System memory - 128KB in size.
    mem: Box<[u16; MEMORY_MAX]>,
    /// Program counter
    pc: u16,
    /// 8x 16-bit registers
    reg: [u16; 8],
    /// Condition code
    flag: RunFlag,
    /// Set to `Halted` by the HALT trap
    status: Status,
    /// Keyboard capability backing GETC/IN and the memory-mapped registers
    input: Box<dyn InputSource>,
    /// Byte sink for the output traps; flushed after every trap-driven write
    output: Box<dyn Write>,
    /// Checked once per fetch so the loop can be stopped from outside
    stop: Arc<AtomicBool>,
}

/// Condition code. Exactly one flag is in effect at any time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RunFlag {
    N = 0b100,
    Z = 0b010,
    P = 0b001,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Running,
    Halted,
}

impl RunState {
    pub fn new(input: Box<dyn InputSource>, output: Box<dyn Write>) -> RunState {
        RunState {
            mem: Box::new([0; MEMORY_MAX]),
            pc: PC_START,
            reg: [0; 8],
            flag: RunFlag::Z,
            status: Status::Running,
            input,
            output,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Copy an image payload into memory starting at `origin`.
    ///
    /// A payload reaching past the end of memory is truncated to the words
    /// that fit.
    pub fn load_image(&mut self, origin: u16, words: &[u16]) {
        let origin = origin as usize;
        let len = words.len().min(MEMORY_MAX - origin);
        self.mem[origin..origin + len].copy_from_slice(&words[..len]);
    }

    /// Stop flag checked once per fetch. Storing `true` makes [`RunState::run`]
    /// return after the current instruction completes.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn is_halted(&self) -> bool {
        self.status == Status::Halted
    }

    const OP_TABLE: [fn(&mut RunState, u16) -> Result<()>; 16] = [
        Self::br,       // 0x0
        Self::add,      // 0x1
        Self::ld,       // 0x2
        Self::st,       // 0x3
        Self::jsr,      // 0x4
        Self::and,      // 0x5
        Self::ldr,      // 0x6
        Self::str,      // 0x7
        Self::rti,      // 0x8
        Self::not,      // 0x9
        Self::ldi,      // 0xA
        Self::sti,      // 0xB
        Self::jmp,      // 0xC
        Self::reserved, // 0xD
        Self::lea,      // 0xE
        Self::trap,     // 0xF
    ];

    /// Fetch-decode-dispatch until HALT, a fatal diagnostic, or the stop flag.
    pub fn run(&mut self) -> Result<()> {
        while self.status == Status::Running && !self.stop.load(Ordering::Relaxed) {
            let instr = self.mem_read(self.pc)?;
            let opcode = (instr >> 12) as usize;
            // PC incremented before instruction is performed
            self.pc = self.pc.wrapping_add(1);
            Self::OP_TABLE[opcode](self, instr)?;
        }
        Ok(())
    }

    #[inline]
    fn reg(&mut self, reg: u16) -> &mut u16 {
        // SAFETY: Should only be indexed with values that are & 0b111
        unsafe { self.reg.get_unchecked_mut(reg as usize) }
    }

    #[inline]
    fn mem(&mut self, addr: u16) -> &mut u16 {
        // SAFETY: memory fits any u16 index
        unsafe { self.mem.get_unchecked_mut(addr as usize) }
    }

    /// Instruction-visible memory read.
    ///
    /// Reading the keyboard status register polls the input device: a waiting
    /// byte sets bit 15 and is latched into the data register, otherwise the
    /// status word is cleared. All other addresses return the stored word.
    fn mem_read(&mut self, addr: u16) -> Result<u16> {
        if addr == MR_KBSR {
            if self.input.available() {
                let byte = self.input.read_byte().map_err(error::input_failure)?;
                *self.mem(MR_KBSR) = 1 << 15;
                *self.mem(MR_KBDR) = byte as u16;
            } else {
                *self.mem(MR_KBSR) = 0;
            }
        }
        Ok(*self.mem(addr))
    }

    fn mem_write(&mut self, addr: u16, val: u16) {
        *self.mem(addr) = val;
    }

    #[inline]
    fn s_ext(val: u16, bits: u32) -> u16 {
        debug_assert!(bits >= 1 && bits <= 16);
        // Move the field's sign bit up to bit 15, then arithmetic-shift back
        // down. Bits above the field are discarded by the left shift.
        let shift = 16 - bits;
        (((val << shift) as i16) >> shift) as u16
    }

    #[inline]
    fn set_flags(&mut self, val: u16) {
        self.flag = if val == 0 {
            RunFlag::Z
        } else if val >> 15 != 0 {
            RunFlag::N
        } else {
            RunFlag::P
        };
    }

    fn add(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;

        let val1 = *self.reg(sr);
        // Bit 5 selects an immediate second operand
        let val2 = if instr & 0b10_0000 == 0 {
            *self.reg(instr & 0b111)
        } else {
            Self::s_ext(instr, 5)
        };
        let res = val1.wrapping_add(val2);
        *self.reg(dr) = res;
        self.set_flags(res);
        Ok(())
    }

    fn and(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;

        let val1 = *self.reg(sr);
        let val2 = if instr & 0b10_0000 == 0 {
            *self.reg(instr & 0b111)
        } else {
            Self::s_ext(instr, 5)
        };
        let res = val1 & val2;
        *self.reg(dr) = res;
        self.set_flags(res);
        Ok(())
    }

    fn not(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let sr = (instr >> 6) & 0b111;
        let val = !*self.reg(sr);
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn br(&mut self, instr: u16) -> Result<()> {
        let test = (instr >> 9) & 0b111;
        if test & self.flag as u16 != 0 {
            self.pc = self.pc.wrapping_add(Self::s_ext(instr, 9));
        }
        Ok(())
    }

    fn jmp(&mut self, instr: u16) -> Result<()> {
        let br = (instr >> 6) & 0b111;
        self.pc = *self.reg(br);
        Ok(())
    }

    fn jsr(&mut self, instr: u16) -> Result<()> {
        *self.reg(7) = self.pc;
        if instr & 0x800 == 0 {
            // reg
            let br = (instr >> 6) & 0b111;
            self.pc = *self.reg(br);
        } else {
            // offs
            self.pc = self.pc.wrapping_add(Self::s_ext(instr, 11));
        }
        Ok(())
    }

    fn ld(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let val = self.mem_read(self.pc.wrapping_add(Self::s_ext(instr, 9)))?;
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn ldi(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let ptr = self.mem_read(self.pc.wrapping_add(Self::s_ext(instr, 9)))?;
        let val = self.mem_read(ptr)?;
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn ldr(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let br = (instr >> 6) & 0b111;
        let ptr = *self.reg(br);
        let val = self.mem_read(ptr.wrapping_add(Self::s_ext(instr, 6)))?;
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    // No memory access, yet the flags are still set from the address
    fn lea(&mut self, instr: u16) -> Result<()> {
        let dr = (instr >> 9) & 0b111;
        let val = self.pc.wrapping_add(Self::s_ext(instr, 9));
        *self.reg(dr) = val;
        self.set_flags(val);
        Ok(())
    }

    fn st(&mut self, instr: u16) -> Result<()> {
        let sr = (instr >> 9) & 0b111;
        let val = *self.reg(sr);
        self.mem_write(self.pc.wrapping_add(Self::s_ext(instr, 9)), val);
        Ok(())
    }

    fn sti(&mut self, instr: u16) -> Result<()> {
        let sr = (instr >> 9) & 0b111;
        let val = *self.reg(sr);
        let ptr = self.mem_read(self.pc.wrapping_add(Self::s_ext(instr, 9)))?;
        self.mem_write(ptr, val);
        Ok(())
    }

    fn str(&mut self, instr: u16) -> Result<()> {
        let sr = (instr >> 9) & 0b111;
        let br = (instr >> 6) & 0b111;
        let ptr = *self.reg(br);
        let val = *self.reg(sr);
        self.mem_write(ptr.wrapping_add(Self::s_ext(instr, 6)), val);
        Ok(())
    }

    fn rti(&mut self, instr: u16) -> Result<()> {
        Err(error::invalid_opcode(self.pc.wrapping_sub(1), instr))
    }

    fn reserved(&mut self, instr: u16) -> Result<()> {
        Err(error::invalid_opcode(self.pc.wrapping_sub(1), instr))
    }

    fn trap(&mut self, instr: u16) -> Result<()> {
        // Return address, same contract as JSR
        *self.reg(7) = self.pc;
        match instr & 0xFF {
            // getc: read one byte, no echo
            0x20 => {
                let byte = self.read_input()?;
                *self.reg(0) = byte as u16;
                self.set_flags(byte as u16);
            }
            // out
            0x21 => {
                let byte = (*self.reg(0) & 0xFF) as u8;
                self.write_bytes(&[byte])?;
                self.flush()?;
            }
            // puts: one character per word, low byte
            0x22 => {
                let start = *self.reg(0);
                for addr in start.. {
                    let word = self.mem_read(addr)?;
                    if word == 0 {
                        break;
                    }
                    self.write_bytes(&[(word & 0xFF) as u8])?;
                }
                self.flush()?;
            }
            // in: prompt and echo
            0x23 => {
                self.write_bytes(b"Enter a character: ")?;
                self.flush()?;
                let byte = self.read_input()?;
                self.write_bytes(&[byte])?;
                self.flush()?;
                *self.reg(0) = byte as u16;
                self.set_flags(byte as u16);
            }
            // putsp: two characters per word, low byte first
            0x24 => {
                let start = *self.reg(0);
                'string: for addr in start.. {
                    let word = self.mem_read(addr)?;
                    for byte in [(word & 0xFF) as u8, (word >> 8) as u8] {
                        if byte == 0 {
                            break 'string;
                        }
                        self.write_bytes(&[byte])?;
                    }
                }
                self.flush()?;
            }
            // halt
            0x25 => {
                self.flush()?;
                let notice = format!("\n{:>12}\n", "Halted".cyan());
                self.write_bytes(notice.as_bytes())?;
                self.flush()?;
                self.status = Status::Halted;
            }
            // unknown
            _ => return Err(error::invalid_trap(self.pc.wrapping_sub(1), instr)),
        }
        Ok(())
    }

    fn read_input(&mut self) -> Result<u8> {
        self.input.read_byte().map_err(error::input_failure)
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.output.write_all(bytes).map_err(error::output_failure)
    }

    fn flush(&mut self) -> Result<()> {
        self.output.flush().map_err(error::output_failure)
    }
}

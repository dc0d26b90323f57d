// Wed Oct 21 2026 - Alex

use crate::memory::{Buffer, MemoryError, ProcessHandle};

/// Longest x86 instruction.
pub const MAX_INSTRUCTION_SIZE: usize = 15;

/// Turns raw code bytes into instructions. The engine never looks inside
/// `Instruction`; it only needs its length and a printable form.
pub trait InstructionDecoder {
    type Instruction;

    /// Decodes the instruction at the start of `bytes`, which were read from
    /// `address`.
    fn decode(&self, bytes: &[u8], address: u64) -> Option<Self::Instruction>;

    fn length(&self, instruction: &Self::Instruction) -> usize;

    fn format(&self, instruction: &Self::Instruction) -> String;
}

/// `None` when the bytes at `address` cannot be read or do not decode.
pub fn decode_at<D: InstructionDecoder>(
    process: &ProcessHandle,
    decoder: &D,
    address: u64,
    max_len: usize,
) -> Result<Option<D::Instruction>, MemoryError> {
    let mut buffer = Buffer::for_process(process, max_len)?;
    if !buffer.read_from(process, address, 0, max_len)? {
        return Ok(None);
    }
    Ok(decoder.decode(buffer.as_slice(), address))
}

/// Decodes up to `count` consecutive instructions, stopping at the first one
/// that fails.
pub fn disassemble<D: InstructionDecoder>(
    process: &ProcessHandle,
    decoder: &D,
    address: u64,
    count: usize,
) -> Result<Vec<(u64, String)>, MemoryError> {
    let mut out = Vec::with_capacity(count);
    let mut current = address;
    while out.len() < count {
        let Some(insn) = decode_at(process, decoder, current, MAX_INSTRUCTION_SIZE)? else {
            break;
        };
        let len = decoder.length(&insn).max(1);
        out.push((current, decoder.format(&insn)));
        current = current.wrapping_add(len as u64);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Protection, SimulatedProcess};

    struct TinyX86;

    enum Op {
        Nop,
        Ret,
        Call(i32),
    }

    impl InstructionDecoder for TinyX86 {
        type Instruction = (u64, Op);

        fn decode(&self, bytes: &[u8], address: u64) -> Option<Self::Instruction> {
            match *bytes.first()? {
                0x90 => Some((address, Op::Nop)),
                0xC3 => Some((address, Op::Ret)),
                0xE8 => {
                    let rel = i32::from_le_bytes(bytes.get(1..5)?.try_into().ok()?);
                    Some((address, Op::Call(rel)))
                }
                _ => None,
            }
        }

        fn length(&self, instruction: &Self::Instruction) -> usize {
            match instruction.1 {
                Op::Call(_) => 5,
                _ => 1,
            }
        }

        fn format(&self, instruction: &Self::Instruction) -> String {
            match instruction.1 {
                Op::Nop => "nop".to_string(),
                Op::Ret => "ret".to_string(),
                Op::Call(rel) => format!("call {:#x}", (instruction.0 + 5).wrapping_add_signed(rel as i64)),
            }
        }
    }

    #[test]
    fn test_disassemble_until_invalid() {
        let sim = SimulatedProcess::new(3, "code");
        sim.map_region(0x40_0000, 0x1000, Protection::EXECUTE_READ, "text");
        let mut process = ProcessHandle::new(sim.clone());
        assert!(process.attach(3).unwrap());
        sim.poke(0x40_0000, &[0x90, 0xE8, 0x10, 0, 0, 0, 0xC3, 0x0F]);

        let listing = disassemble(&process, &TinyX86, 0x40_0000, 10).unwrap();
        assert_eq!(
            listing,
            vec![
                (0x40_0000, "nop".to_string()),
                (0x40_0001, "call 0x400016".to_string()),
                (0x40_0006, "ret".to_string()),
            ]
        );
        assert_eq!(disassemble(&process, &TinyX86, 0x40_0000, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_unreadable_address() {
        let sim = SimulatedProcess::new(3, "code");
        let mut process = ProcessHandle::new(sim);
        assert!(process.attach(3).unwrap());
        assert!(decode_at(&process, &TinyX86, 0x1000, 4).unwrap().is_none());
        assert!(decode_at(&process, &TinyX86, 0x1000, 0).is_err());
    }
}

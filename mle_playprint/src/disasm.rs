use std::fmt;

use mle_formats::Endian;
use serde::Serialize;

use crate::cursor::ByteCursor;
use crate::error::{LoadError, Result};
use crate::opcode::Opcode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    None,
    Index(u32),
    /// Raw property bytes (`copyProperty`, `copyDynamicProperty`).
    Bytes(Vec<u8>),
    Array {
        count: usize,
        element_size: usize,
        bytes: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub offset: usize,
    pub opcode: Opcode,
    pub operand: Operand,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}  {:<20}", self.offset, self.opcode.mnemonic())?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Index(index) => write!(f, "{index}"),
            Operand::Bytes(bytes) => write!(f, "{}", hex(bytes)),
            Operand::Array {
                count,
                element_size,
                bytes,
            } => write!(f, "{count} x {element_size}: {}", hex(bytes)),
        }
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Group chunk header plus its decoded stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupListing {
    pub group_class: i32,
    pub actor_count: u32,
    pub instructions: Vec<Instruction>,
}

/// Decodes an opcode stream without building anything.
///
/// Tracks the selected property length so fixed and array copies can be
/// sized, and stops at `endActorGroup` like the interpreter does.
pub fn disassemble(bytes: &[u8], endian: Endian) -> Result<Vec<Instruction>> {
    let mut cursor = ByteCursor::new(bytes, endian);
    disassemble_from(&mut cursor)
}

pub fn disassemble_group(payload: &[u8], endian: Endian) -> Result<GroupListing> {
    let mut cursor = ByteCursor::new(payload, endian);
    let group_class = cursor.read_fixed_i32()?;
    let actor_count = cursor.read_var_index()?;
    Ok(GroupListing {
        group_class,
        actor_count,
        instructions: disassemble_from(&mut cursor)?,
    })
}

fn disassemble_from(cursor: &mut ByteCursor<'_>) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    let mut property_length = 0usize;

    while !cursor.is_at_end() {
        let offset = cursor.position();
        let byte = cursor.read_byte()?;
        let opcode = Opcode::try_from(byte)
            .map_err(|_| LoadError::UnknownOpcode { opcode: byte, offset })?;

        let operand = match opcode {
            Opcode::CreateActor
            | Opcode::SetSet
            | Opcode::BindRole
            | Opcode::ParentRole
            | Opcode::ChildRole
            | Opcode::SetPropertyOffset
            | Opcode::CopyMediaRef
            | Opcode::CreateSet => Operand::Index(cursor.read_var_index()?),
            Opcode::SetPropertyLength => {
                let length = cursor.read_var_index()?;
                property_length = length as usize;
                Operand::Index(length)
            }
            Opcode::CopyProperty => Operand::Bytes(cursor.read_bytes(property_length)?.to_vec()),
            Opcode::CopyDynamicProperty => {
                let length = read_length(cursor)?;
                Operand::Bytes(cursor.read_bytes(length)?.to_vec())
            }
            Opcode::CopyArrayProperty => {
                let count_offset = cursor.position();
                let count = read_length(cursor)?;
                let total = count.checked_mul(property_length).ok_or_else(|| {
                    LoadError::MalformedStream {
                        offset: count_offset,
                        reason: format!("{count} elements of {property_length} bytes overflow"),
                    }
                })?;
                Operand::Array {
                    count,
                    element_size: property_length,
                    bytes: cursor.read_bytes(total)?.to_vec(),
                }
            }
            Opcode::EndActorGroup => {
                cursor.skip_to_end();
                Operand::None
            }
            Opcode::EndSet => Operand::None,
            Opcode::BeginActorSet => {
                return Err(LoadError::UnknownOpcode { opcode: byte, offset });
            }
        };
        instructions.push(Instruction {
            offset,
            opcode,
            operand,
        });
    }
    Ok(instructions)
}

fn read_length(cursor: &mut ByteCursor<'_>) -> Result<usize> {
    let offset = cursor.position();
    let value = cursor.read_fixed_i32()?;
    usize::try_from(value).map_err(|_| LoadError::MalformedStream {
        offset,
        reason: format!("negative length {value}"),
    })
}

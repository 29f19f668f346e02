use std::convert::TryFrom;

use serde::Serialize;

/// Single-byte instructions of the playprint actor-group stream.
///
/// Values are part of the compiled file format and never change. Every
/// opcode has its high bit set, which is also what terminates a varint
/// argument in front of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum Opcode {
    /// Retired; sets are named by role bindings now.
    BeginActorSet = 0x80,
    CreateActor = 0x81,
    SetSet = 0x82,
    BindRole = 0x83,
    ParentRole = 0x84,
    ChildRole = 0x85,
    SetPropertyOffset = 0x86,
    SetPropertyLength = 0x87,
    CopyProperty = 0x88,
    CopyMediaRef = 0x89,
    EndActorGroup = 0x8a,
    CopyDynamicProperty = 0x8b,
    CopyArrayProperty = 0x8c,
    CreateSet = 0x8d,
    EndSet = 0x8e,
}

impl Opcode {
    pub const ALL: [Opcode; 15] = [
        Opcode::BeginActorSet,
        Opcode::CreateActor,
        Opcode::SetSet,
        Opcode::BindRole,
        Opcode::ParentRole,
        Opcode::ChildRole,
        Opcode::SetPropertyOffset,
        Opcode::SetPropertyLength,
        Opcode::CopyProperty,
        Opcode::CopyMediaRef,
        Opcode::EndActorGroup,
        Opcode::CopyDynamicProperty,
        Opcode::CopyArrayProperty,
        Opcode::CreateSet,
        Opcode::EndSet,
    ];

    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Name used by the authoring tools and in traces.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::BeginActorSet => "beginActorSet",
            Opcode::CreateActor => "createActor",
            Opcode::SetSet => "setSet",
            Opcode::BindRole => "bindRole",
            Opcode::ParentRole => "parentRole",
            Opcode::ChildRole => "childRole",
            Opcode::SetPropertyOffset => "setPropertyOffset",
            Opcode::SetPropertyLength => "setPropertyLength",
            Opcode::CopyProperty => "copyProperty",
            Opcode::CopyMediaRef => "copyMediaRef",
            Opcode::EndActorGroup => "endActorGroup",
            Opcode::CopyDynamicProperty => "copyDynamicProperty",
            Opcode::CopyArrayProperty => "copyArrayProperty",
            Opcode::CreateSet => "createSet",
            Opcode::EndSet => "endSet",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x80..=0x8e => Ok(Opcode::ALL[(value - 0x80) as usize]),
            other => Err(other),
        }
    }
}

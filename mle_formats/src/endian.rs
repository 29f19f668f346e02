use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::Serialize;

/// Byte order of the integers and floats stored in a registry or playprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        }
    }

    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        }
    }

    pub fn read_i32(self, bytes: &[u8]) -> i32 {
        match self {
            Endian::Little => LittleEndian::read_i32(bytes),
            Endian::Big => BigEndian::read_i32(bytes),
        }
    }

    pub fn read_f32(self, bytes: &[u8]) -> f32 {
        match self {
            Endian::Little => LittleEndian::read_f32(bytes),
            Endian::Big => BigEndian::read_f32(bytes),
        }
    }

    pub fn put_u16(self, out: &mut Vec<u8>, value: u16) {
        let mut buf = [0u8; 2];
        match self {
            Endian::Little => LittleEndian::write_u16(&mut buf, value),
            Endian::Big => BigEndian::write_u16(&mut buf, value),
        }
        out.extend_from_slice(&buf);
    }

    pub fn put_u32(self, out: &mut Vec<u8>, value: u32) {
        let mut buf = [0u8; 4];
        match self {
            Endian::Little => LittleEndian::write_u32(&mut buf, value),
            Endian::Big => BigEndian::write_u32(&mut buf, value),
        }
        out.extend_from_slice(&buf);
    }

    pub fn put_i32(self, out: &mut Vec<u8>, value: i32) {
        let mut buf = [0u8; 4];
        match self {
            Endian::Little => LittleEndian::write_i32(&mut buf, value),
            Endian::Big => BigEndian::write_i32(&mut buf, value),
        }
        out.extend_from_slice(&buf);
    }

    pub fn put_f32(self, out: &mut Vec<u8>, value: f32) {
        let mut buf = [0u8; 4];
        match self {
            Endian::Little => LittleEndian::write_f32(&mut buf, value),
            Endian::Big => BigEndian::write_f32(&mut buf, value),
        }
        out.extend_from_slice(&buf);
    }
}

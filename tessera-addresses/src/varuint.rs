//! Decode / encode variable-length uints

use std::io::{Cursor, Read};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("variable-length uint overflow")]
    VarUintOverflow,

    #[error("unexpected end-of-buffer")]
    UnexpectedEof,
}

pub fn read(cursor: &mut Cursor<&[u8]>) -> Result<u64, Error> {
    let mut output = 0u128;
    let mut buf = [0u8; 1];

    loop {
        cursor
            .read_exact(&mut buf)
            .map_err(|_| Error::UnexpectedEof)?;

        let byte = buf[0];

        output = (output << 7) | (byte & 0x7F) as u128;

        if output > u64::MAX.into() {
            return Err(Error::VarUintOverflow);
        }

        if (byte & 0x80) == 0 {
            return Ok(output as u64);
        }
    }
}

/// Appends `num` as a big-endian base-128 varuint
pub fn write(out: &mut Vec<u8>, mut num: u64) {
    let start = out.len();

    out.push(num as u8 & 0x7F);
    num >>= 7;

    while num > 0 {
        out.push((num & 0x7F) as u8 | 0x80);
        num >>= 7;
    }

    out[start..].reverse();
}

//! Decoding of packed volume payloads.
//!
//! Volume records tag their payload with a method id; dispatch happens on
//! that id alone:
//!
//! | method | scheme                                      |
//! |--------|---------------------------------------------|
//! | 0      | stored                                      |
//! | 1      | in-stream node-table Huffman                |
//! | 2      | adaptive-dictionary token codec             |
//! | 3      | method 2, then the view restructuring pass  |
//! | 4      | implode-style codec, then the pic pass      |

pub(crate) mod dcl;
pub(crate) mod huffman;
pub(crate) mod lzw;
pub(crate) mod reorder;
mod trees;

use crate::error::Error;

/// Decodes `src` into exactly `unpacked_size` bytes.
pub(crate) fn decompress(
    method: u16,
    src: &[u8],
    unpacked_size: usize,
) -> Result<Vec<u8>, Error> {
    match method {
        0 => {
            if src.len() < unpacked_size {
                return Err(Error::DecompressionOverflow);
            }
            Ok(src[..unpacked_size].to_vec())
        }
        1 => huffman::unpack(src, unpacked_size),
        2 => lzw::unpack(src, unpacked_size),
        3 => reorder::reorder_view(&lzw::unpack(src, unpacked_size)?),
        4 => reorder::reorder_pic(&dcl::unpack(src, unpacked_size)?),
        other => Err(Error::UnknownCompression(other)),
    }
}

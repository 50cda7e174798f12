// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Byte-level encoding shared by every serialized filter and estimator.

mod decode;
mod encode;
pub(crate) mod family;

pub(crate) use self::decode::SketchSlice;
pub(crate) use self::encode::SketchBytes;

use bitvec::prelude::BitVec;
use bitvec::prelude::Lsb0;

use crate::error::Error;

/// Serialization version written into every preamble.
pub(crate) const SERIAL_VERSION: u8 = 1;

/// Maps an `io::Error` from a short read into a tagged deserialization error.
pub(crate) fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
    move |err| Error::insufficient_data(tag).set_source(err)
}

/// Writes a bit-packed array as a 32-bit bit count followed by the packed bytes.
pub(crate) fn write_bits(bytes: &mut SketchBytes, bits: &BitVec<u8, Lsb0>) {
    bytes.write_u32_le(bits.len() as u32);
    bytes.write(bits.as_raw_slice());
}

/// Reads a bit-packed array written by [`write_bits`].
pub(crate) fn read_bits(
    slice: &mut SketchSlice<'_>,
    tag: &'static str,
) -> Result<BitVec<u8, Lsb0>, Error> {
    let num_bits = slice.read_u32_le().map_err(make_error(tag))? as usize;
    let num_bytes = num_bits.div_ceil(8);
    if slice.remaining() < num_bytes {
        return Err(Error::insufficient_data(tag)
            .with_context("needed", num_bytes)
            .with_context("remaining", slice.remaining()));
    }
    let mut raw = vec![0u8; num_bytes];
    slice.read_exact(&mut raw).map_err(make_error(tag))?;
    let mut bits = BitVec::<u8, Lsb0>::from_vec(raw);
    bits.truncate(num_bits);
    Ok(bits)
}

/// Fails if `slice` holds bytes past the end of a complete payload.
pub(crate) fn ensure_consumed(slice: &SketchSlice<'_>, what: &'static str) -> Result<(), Error> {
    if slice.remaining() != 0 {
        return Err(Error::deserial(format!("trailing bytes after {what}"))
            .with_context("remaining", slice.remaining()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use bitvec::prelude::*;

    use super::*;

    #[test]
    fn test_bits_round_trip_unaligned() {
        let mut bits = bitvec![u8, Lsb0; 0; 13];
        bits.set(0, true);
        bits.set(7, true);
        bits.set(12, true);

        let mut bytes = SketchBytes::with_capacity(8);
        write_bits(&mut bytes, &bits);
        let bytes = bytes.into_bytes();
        assert_eq!(bytes.len(), 4 + 2);

        let mut slice = SketchSlice::new(&bytes);
        let restored = read_bits(&mut slice, "bits").unwrap();
        assert_eq!(restored, bits);
    }

    #[test]
    fn test_bits_truncated() {
        let bytes = [16u8, 0, 0, 0, 0xff];
        let mut slice = SketchSlice::new(&bytes);
        let err = read_bits(&mut slice, "membership").unwrap_err();
        assert!(err.message().contains("membership"));
    }

    #[test]
    fn test_bit_count_beyond_input() {
        let mut bytes = SketchBytes::with_capacity(8);
        bytes.write_u32_le(u32::MAX);
        bytes.write(&[0xff; 3]);
        let bytes = bytes.into_bytes();

        let mut slice = SketchSlice::new(&bytes);
        let err = read_bits(&mut slice, "bits").unwrap_err();
        assert!(err.message().starts_with("insufficient data: bits"));
    }
}

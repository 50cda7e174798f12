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

use std::io;
use std::io::Cursor;
use std::io::Read;

use byteorder::LE;
use byteorder::ReadBytesExt;

/// A wrapper around a byte slice that provides methods for reading various types of data from it.
pub struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
}

impl SketchSlice<'_> {
    /// Creates a new `SketchSlice` from the given byte slice.
    pub fn new(slice: &[u8]) -> SketchSlice<'_> {
        SketchSlice {
            slice: Cursor::new(slice),
        }
    }

    /// Returns the number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        let len = self.slice.get_ref().len() as u64;
        len.saturating_sub(self.slice.position()) as usize
    }

    /// Reads exactly `buf.len()` bytes from the slice into `buf`.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.slice.read_exact(buf)
    }

    /// Reads a single byte from the slice and returns it as a `u8`.
    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.slice.read_u8()
    }

    /// Reads a 32-bit unsigned integer from the slice in little-endian byte order.
    pub fn read_u32_le(&mut self) -> io::Result<u32> {
        self.slice.read_u32::<LE>()
    }

    /// Reads a 64-bit signed integer from the slice in little-endian byte order.
    pub fn read_i64_le(&mut self) -> io::Result<i64> {
        self.slice.read_i64::<LE>()
    }

    /// Reads a 32-bit floating-point number from the slice in little-endian byte order.
    pub fn read_f32_le(&mut self) -> io::Result<f32> {
        self.slice.read_f32::<LE>()
    }

    /// Reads a 64-bit floating-point number from the slice in little-endian byte order.
    pub fn read_f64_le(&mut self) -> io::Result<f64> {
        self.slice.read_f64::<LE>()
    }
}

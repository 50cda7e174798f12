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

use crate::codec::SERIAL_VERSION;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::codec::make_error;
use crate::error::Error;

/// Defines the families of serialized structures.
///
/// Every serialized image starts with a four byte preamble: serial version, family id,
/// flags and one reserved byte.
pub(crate) struct Family {
    /// The byte ID for this family.
    pub id: u8,
    /// The name for this family.
    pub name: &'static str,
}

impl Family {
    /// Invertible Bloom filter data.
    pub const IBF: Family = Family {
        id: 40,
        name: "IBF",
    };

    /// Strata estimator data.
    pub const STRATA: Family = Family {
        id: 41,
        name: "STRATA",
    };

    /// b-bit minwise hash estimator data.
    pub const MINWISE: Family = Family {
        id: 42,
        name: "MINWISE",
    };

    /// Hybrid estimator data.
    pub const HYBRID: Family = Family {
        id: 43,
        name: "HYBRID",
    };
}

impl Family {
    pub fn validate_id(&self, family_id: u8) -> Result<(), Error> {
        if family_id != self.id {
            Err(Error::invalid_family(self.id, family_id, self.name))
        } else {
            Ok(())
        }
    }

    pub fn write_preamble(&self, bytes: &mut SketchBytes, flags: u8) {
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(self.id);
        bytes.write_u8(flags);
        bytes.write_u8(0); // reserved
    }

    /// Reads and validates a preamble, returning the flags byte.
    pub fn read_preamble(&self, slice: &mut SketchSlice<'_>) -> Result<u8, Error> {
        let serial_version = slice.read_u8().map_err(make_error("serial_version"))?;
        let family_id = slice.read_u8().map_err(make_error("family_id"))?;
        let flags = slice.read_u8().map_err(make_error("flags"))?;
        slice.read_u8().map_err(make_error("reserved"))?;

        self.validate_id(family_id)?;
        if serial_version != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(
                SERIAL_VERSION,
                serial_version,
            ));
        }
        Ok(flags)
    }
}

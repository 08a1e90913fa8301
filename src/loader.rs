/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use memmap2::Mmap;

#[derive(Debug, Clone)]
pub enum OpenError {
    CantOpenFile(String),
}

pub struct OpenOpts {
    pub gz: bool,
}

impl Default for OpenOpts {
    fn default() -> Self {
        Self {
            gz: false
        }
    }
}

/* Plain sources are memory-mapped, gzipped sources are streamed through a
 * decoder. Decompress with gzip -d first to take the mmap path.
 */
pub fn open<P>(path: P, opts: OpenOpts) -> Result<Box<dyn BufRead>, OpenError> where
    P: AsRef<Path>,
{
    let model_file = File::open(path)
        .map_err(|e| OpenError::CantOpenFile(format!("{:?}", e)))?;

    let reader: Box<dyn BufRead> = if opts.gz {
        Box::new(BufReader::new(GzDecoder::new(model_file)))
    } else {
        /* UNSAFE DUE TO A POTENTIAL UB WHEN A FILE IS CHANGED! */
        let mmapped = unsafe { Mmap::map(&model_file) }
            .map_err(|e| OpenError::CantOpenFile(format!("mmap failed: {:?}", e)))?;
        Box::new(Cursor::new(mmapped))
    };

    Ok(reader)
}

/// Read a whole resource into memory. Used for opaque payloads (bitmaps)
/// that the model core stores but never interprets.
pub fn slurp<P>(path: P, opts: OpenOpts) -> Result<Vec<u8>, OpenError> where
    P: AsRef<Path>,
{
    let mut reader = open(path, opts)?;
    let mut data = Vec::new();

    reader.read_to_end(&mut data)
        .map_err(|e| OpenError::CantOpenFile(format!("{:?}", e)))?;

    Ok(data)
}

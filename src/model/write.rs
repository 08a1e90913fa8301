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
use std::io::{self, Write};
use std::path::Path;

use super::*;

fn write_pairs<W>(keyword: &str, pairs: &[Pair], out: &mut W)
    -> io::Result<()> where
    W: Write,
{
    for pair in pairs {
        match &pair.value {
            Some(value) => writeln!(out, "{} {} {}", keyword, pair.key, value)?,
            None => writeln!(out, "{} {}", keyword, pair.key)?,
        }
    }

    Ok(())
}

fn write_inputs<W>(o: &Model, out: &mut W) -> io::Result<()> where
    W: Write,
{
    let mut prefix = ".inputs ";

    for port in o.ports.iter().filter(|p| p.is_input()) {
        write!(out, "{}{}", prefix, port.name)?;
        prefix = " ";
    }

    if prefix == " " {
        writeln!(out)?;
    }

    Ok(())
}

/* Everything that is neither an input nor an internal net is a
 * model-boundary output. */
fn write_outputs<W>(o: &Model, out: &mut W) -> io::Result<()> where
    W: Write,
{
    let mut prefix = ".outputs ";

    for port in o.ports.iter().filter(|p| !p.is_input() && !p.is_local()) {
        write!(out, "{}{}", prefix, port.name)?;
        prefix = " ";
    }

    if prefix == " " {
        writeln!(out)?;
    }

    Ok(())
}

fn write_cell<W>(cell: &Cell, out: &mut W) -> io::Result<()> where
    W: Write,
{
    match cell.type_name.as_str() {
        TYPE_TABLE => write!(out, ".table")?,
        TYPE_LATCH => write!(out, ".latch")?,
        type_name => write!(out, ".subckt {}", type_name)?,
    }

    for bind in &cell.binds {
        match &bind.port {
            Some(port) => write!(out, " {}={}", port, bind.value)?,
            None => write!(out, " {}", bind.value)?,
        }
    }

    writeln!(out)?;

    /* auto-generated instance names are left for the reader to recreate */
    if cell.is_named() {
        writeln!(out, ".cname {}", cell.name)?;
    }

    write_pairs(".param", &cell.params, out)?;

    if let Some(ni) = cell.ni {
        writeln!(out, ".attr {} {}", ATTR_CELL_INPUTS, ni)?;
    }

    if let Some(no) = cell.no {
        writeln!(out, ".attr {} {}", ATTR_CELL_OUTPUTS, no)?;
    }

    write_pairs(".attr", &cell.attrs, out)?;

    if let Some(bitmap) = &cell.bitmap {
        writeln!(out, ".bitmap {}", bitmap.path)?;
    }

    for tuple in &cell.tuples {
        writeln!(out, "{}", tuple.items.join(" "))?;
    }

    Ok(())
}

fn write_one<W>(o: &Model, out: &mut W) -> io::Result<()> where
    W: Write,
{
    writeln!(out, ".model {}", o.name)?;

    write_pairs(".param", &o.params, out)?;
    write_inputs(o, out)?;
    write_outputs(o, out)?;

    writeln!(out)?;

    for cell in &o.cells {
        write_cell(cell, out)?;
        writeln!(out)?;
    }

    for wire in &o.wires {
        writeln!(out, ".wire {} {}", wire.sink, wire.source)?;
    }

    if !o.wires.is_empty() {
        writeln!(out)?;
    }

    writeln!(out, ".end")
}

/// Serialize a model tree, depth-first. Reading the output back yields an
/// equivalent tree: same declared parameters, boundary ports, cells with
/// their binds/attributes/params/tuples and wires, in declaration order.
pub fn model_write<W>(o: &Model, out: &mut W) -> io::Result<()> where
    W: Write,
{
    write_one(o, out)?;

    for sub in &o.models {
        writeln!(out)?;
        model_write(sub, out)?;
    }

    Ok(())
}

/// Serialize to a file, `-` meaning stdout. A partially written file is
/// removed on failure.
pub fn model_write_path<P>(o: &Model, path: P) -> io::Result<()> where
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if path == Path::new("-") {
        let stdout = io::stdout();
        return model_write(o, &mut stdout.lock());
    }

    let mut file = File::create(path)?;

    if let Err(err) = model_write(o, &mut file) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(err);
    }

    Ok(())
}

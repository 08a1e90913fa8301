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

use std::path::Path;

use bitflags::bitflags;
use thiserror::Error;

use crate::loader::{self, OpenOpts};

pub mod connect;
pub mod read;
pub mod write;

#[cfg(test)]
mod tests;

/// Reserved primitive cell types. Every other type name is resolved
/// against the sub-model definitions in lexical scope.
pub const TYPE_TABLE: &str = "table";
pub const TYPE_LATCH: &str = "latch";

/// Recognized cell attributes carrying the declared input/output counts.
pub const ATTR_CELL_INPUTS: &str = "cell-inputs";
pub const ATTR_CELL_OUTPUTS: &str = "cell-outputs";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("no model name given")]
    NoModelName,
    #[error("no cell type given")]
    NoCellType,
    #[error("empty table")]
    EmptyTable,
    #[error("no latch input and output given")]
    NoLatchArgs,
    #[error("no wire sink and source given")]
    NoWireArgs,
    #[error("no parameter name given")]
    NoParamName,
    #[error("no attribute name given")]
    NoAttrName,
    #[error("no common name given")]
    NoCommonName,
    #[error("no bitmap path given")]
    NoBitmapPath,
    #[error("no cell to bind to")]
    NoCellToBind,
    #[error("no cell to add attribute")]
    NoCellForAttr,
    #[error("no cell to add tuple")]
    NoCellForTuple,
    #[error("no cell to name")]
    NoCellToName,
    #[error("no cell to load bitmap")]
    NoCellForBitmap,
    #[error("{0} requires number")]
    AttrNotNumber(String),
    #[error("cannot load bitmap {0}")]
    BitmapLoad(String),
    #[error("cannot find model {model} for cell {cell}")]
    UnknownModel { model: String, cell: String },
    #[error("wrong number of arguments for latch")]
    LatchArity,
    #[error("too many args for cell {0}")]
    TooManyArgs(String),
    #[error("cannot find port {port} for cell {cell}")]
    UnknownPort { port: String, cell: String },
    #[error("cannot bind {value} to local port {port} for cell {cell}")]
    BindToLocal { value: String, port: String, cell: String },
    #[error("multiple drivers for {0}")]
    MultipleDrivers(String),
    #[error("no driver for {0}")]
    NoDriver(String),
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PortFlags: u8 {
        const INPUT  = 1;
        const DRIVEN = 2;
        const LOCAL  = 4;
    }
}

/// Owned key/optional-value record used for parameters and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub key: String,
    pub value: Option<String>,
}

impl Pair {
    pub fn new(key: &str, value: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            value: value.map(str::to_string),
        }
    }
}

/// One truth-table row of a `table` cell. The model core carries rows
/// verbatim; their interpretation belongs to the bitstream layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub items: Vec<String>,
}

/// One port/net association on a cell: an optional explicit formal-port
/// name and the net name it is tied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    pub port: Option<String>,
    pub value: String,
}

/// Diagnostic back-reference: the cell instance (index in the owning
/// model) and the bind ordinal that first touched a port. Never an
/// ownership edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRef {
    pub cell: usize,
    pub ordinal: usize,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub name: String,
    pub flags: PortFlags,
    pub driver: Option<PortRef>,
}

impl Port {
    pub fn is_input(&self) -> bool {
        self.flags.contains(PortFlags::INPUT)
    }

    pub fn is_driven(&self) -> bool {
        self.flags.contains(PortFlags::DRIVEN)
    }

    pub fn is_local(&self) -> bool {
        self.flags.contains(PortFlags::LOCAL)
    }
}

/// Opaque bitmap resource handle. The model core stores the payload for
/// the bitstream layers and never looks inside.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub path: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Cell {
    pub type_name: String,
    pub name: String,
    named: bool,
    pub binds: Vec<Bind>,
    pub attrs: Vec<Pair>,
    pub params: Vec<Pair>,
    pub tuples: Vec<Tuple>,
    /* declared input/output count hints, see ATTR_CELL_INPUTS/_OUTPUTS */
    pub ni: Option<usize>,
    pub no: Option<usize>,
    pub bitmap: Option<Bitmap>,
}

impl Cell {
    fn new(type_name: &str, name: String, named: bool) -> Self {
        Self {
            type_name: type_name.to_string(),
            name,
            named,
            binds: Vec::new(),
            attrs: Vec::new(),
            params: Vec::new(),
            tuples: Vec::new(),
            ni: None,
            no: None,
            bitmap: None,
        }
    }

    /// Whether the instance name was given explicitly rather than
    /// auto-generated.
    pub fn is_named(&self) -> bool {
        self.named
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter()
            .find(|attr| attr.key == name)
            .and_then(|attr| attr.value.as_deref())
    }

    pub fn load_bitmap<P>(&mut self, path: P) -> Result<(), ModelError> where
        P: AsRef<Path>,
    {
        let path = path.as_ref();

        let data = loader::slurp(path, OpenOpts::default())
            .map_err(|_| ModelError::BitmapLoad(path.display().to_string()))?;

        self.bitmap = Some(Bitmap {
            path: path.display().to_string(),
            data,
        });
        Ok(())
    }
}

/// Direct net alias: `sink` is driven by `source`. Resolved with the same
/// registration rules as cell binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wire {
    pub sink: String,
    pub source: String,
}

/// A named scope owning ports, cell instances, wires and nested sub-model
/// definitions. Construction is monotonic append; resolution (see
/// [`connect`](connect::connect)) mutates only port flags and the sticky
/// error slot.
#[derive(Debug, Clone)]
pub struct Model {
    pub name: String,
    pub params: Vec<Pair>,
    pub ports: Vec<Port>,
    pub cells: Vec<Cell>,
    pub wires: Vec<Wire>,
    pub models: Vec<Model>,
    error: Option<ModelError>,
}

impl Model {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            ports: Vec::new(),
            cells: Vec::new(),
            wires: Vec::new(),
            models: Vec::new(),
            error: None,
        }
    }

    /// Append a port. A missing name is auto-generated as `P<n>`.
    pub fn add_port(&mut self, name: Option<&str>, flags: PortFlags,
                    driver: Option<PortRef>) -> usize
    {
        ports_add(&mut self.ports, name, flags, driver)
    }

    /// Model-boundary input. Inputs are externally driven by definition,
    /// so DRIVEN is pre-set at creation.
    pub fn add_input(&mut self, name: &str) -> usize {
        self.add_port(Some(name), PortFlags::INPUT | PortFlags::DRIVEN, None)
    }

    /// Model-boundary output. Stays undriven until something binds it.
    pub fn add_output(&mut self, name: &str) -> usize {
        self.add_port(Some(name), PortFlags::empty(), None)
    }

    /// Append a cell instance. A missing name is auto-generated as `U<n>`.
    pub fn add_cell(&mut self, type_name: &str, name: Option<&str>) {
        let cell = match name {
            Some(name) => Cell::new(type_name, name.to_string(), true),
            None => Cell::new(type_name, format!("U{}", self.cells.len()), false),
        };
        self.cells.push(cell);
    }

    /// Append an owned sub-model definition and return its index.
    pub fn add_model(&mut self, name: &str) -> usize {
        self.models.push(Model::new(name));
        self.models.len() - 1
    }

    pub fn add_wire(&mut self, sink: &str, source: &str) {
        self.wires.push(Wire {
            sink: sink.to_string(),
            source: source.to_string(),
        });
    }

    /// A parameter belongs to the model until the first cell is declared;
    /// from then on trailing parameters modify the most recent cell.
    pub fn add_param(&mut self, name: &str, value: Option<&str>) {
        match self.cells.last_mut() {
            Some(cell) => cell.params.push(Pair::new(name, value)),
            None => self.params.push(Pair::new(name, value)),
        }
    }

    pub fn add_attr(&mut self, name: &str, value: Option<&str>)
        -> Result<(), ModelError>
    {
        let cell = self.cells.last_mut().ok_or(ModelError::NoCellForAttr)?;

        if name == ATTR_CELL_INPUTS {
            cell.ni = Some(parse_arity(ATTR_CELL_INPUTS, value)?);
            return Ok(());
        }

        if name == ATTR_CELL_OUTPUTS {
            cell.no = Some(parse_arity(ATTR_CELL_OUTPUTS, value)?);
            return Ok(());
        }

        cell.attrs.push(Pair::new(name, value));
        Ok(())
    }

    pub fn add_bind(&mut self, port: Option<&str>, value: &str)
        -> Result<(), ModelError>
    {
        let cell = self.cells.last_mut().ok_or(ModelError::NoCellToBind)?;

        cell.binds.push(Bind {
            port: port.map(str::to_string),
            value: value.to_string(),
        });
        Ok(())
    }

    pub fn add_tuple<I, S>(&mut self, items: I) -> Result<(), ModelError> where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cell = self.cells.last_mut().ok_or(ModelError::NoCellForTuple)?;

        cell.tuples.push(Tuple {
            items: items.into_iter().map(Into::into).collect(),
        });
        Ok(())
    }

    /// Give the most recent cell an explicit instance name.
    pub fn rename_last_cell(&mut self, name: &str) -> Result<(), ModelError> {
        let cell = self.cells.last_mut().ok_or(ModelError::NoCellToName)?;

        cell.name = name.to_string();
        cell.named = true;
        Ok(())
    }

    /// Attach an opaque bitmap resource to the most recent cell.
    pub fn load_bitmap<P>(&mut self, path: P) -> Result<(), ModelError> where
        P: AsRef<Path>,
    {
        let cell = self.cells.last_mut().ok_or(ModelError::NoCellForBitmap)?;

        cell.load_bitmap(path)
    }

    pub fn find_port(&self, name: &str) -> Option<usize> {
        ports_find(&self.ports, name)
    }

    /// Scan this model's own sub-model definitions only; the resolver
    /// extends the search through the lexical ancestor chain.
    pub fn find_model(&self, name: &str) -> Option<usize> {
        self.models.iter().position(|m| m.name == name)
    }

    /// The sticky error: the first failure recorded for this model.
    pub fn status(&self) -> Option<&ModelError> {
        self.error.as_ref()
    }

    /// Record a failure. The first message wins; later ones are dropped.
    pub fn fail(&mut self, err: ModelError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

fn parse_arity(attr: &str, value: Option<&str>) -> Result<usize, ModelError> {
    value.and_then(|v| v.parse().ok())
        .ok_or_else(|| ModelError::AttrNotNumber(attr.to_string()))
}

pub(crate) fn ports_add(ports: &mut Vec<Port>, name: Option<&str>,
                        flags: PortFlags, driver: Option<PortRef>) -> usize
{
    let name = match name {
        Some(name) => name.to_string(),
        None => format!("P{}", ports.len()),
    };

    ports.push(Port { name, flags, driver });
    ports.len() - 1
}

/* TODO: build a name-to-index map once models get big enough to hurt */
pub(crate) fn ports_find(ports: &[Port], name: &str) -> Option<usize> {
    ports.iter().position(|p| p.name == name)
}

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

#[allow(unused)]
use crate::log::*;

use super::*;

/// Bind value separating a table cell's source binds from its sink binds.
pub const TABLE_SINK_MARK: &str = "->";

/// Cell kind, decided once per cell before any port is touched.
enum CellKind {
    Table,
    Latch,
    Reference { formals: Vec<Formal> },
    Unknown(ModelError),
}

/// Snapshot of one port of a referenced model: everything the binder
/// needs to know about a formal without holding the definition borrowed.
struct Formal {
    name: String,
    input: bool,
    local: bool,
}

struct ModelPlan {
    cells: Vec<CellKind>,
    children: Vec<ModelPlan>,
}

/* Lexical scope chain: the resolving model's own sub-model definitions
 * first, then each ancestor's, out to the root. */
struct Scope<'a> {
    model: &'a Model,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, name: &str) -> Option<&'a Model> {
        self.model.models.iter()
            .find(|m| m.name == name)
            .or_else(|| self.parent.and_then(|p| p.lookup(name)))
    }
}

/// Resolve every cell's kind up front. Formal interfaces are the
/// referenced model's ports as declared; resolution only ever adds LOCAL
/// ports and flips DRIVEN, neither of which a reference binder consults,
/// so the snapshot matches what an in-place walk would observe.
fn plan_model(o: &Model, parent: Option<&Scope>) -> ModelPlan {
    let scope = Scope { model: o, parent };

    let cells = o.cells.iter()
        .map(|cell| match cell.type_name.as_str() {
            TYPE_TABLE => CellKind::Table,
            TYPE_LATCH => CellKind::Latch,
            type_name => match scope.lookup(type_name) {
                Some(def) => CellKind::Reference {
                    formals: def.ports.iter()
                        .map(|p| Formal {
                            name: p.name.clone(),
                            input: p.is_input(),
                            local: p.is_local(),
                        })
                        .collect(),
                },
                None => CellKind::Unknown(ModelError::UnknownModel {
                    model: type_name.to_string(),
                    cell: cell.name.clone(),
                }),
            },
        })
        .collect();

    let children = o.models.iter()
        .map(|sub| plan_model(sub, Some(&scope)))
        .collect();

    ModelPlan { cells, children }
}

/// Register a sink under the driven-once rule. A second driver for an
/// already-driven net is a conflict; an unknown net becomes a fresh
/// driven local port.
fn add_sink(ports: &mut Vec<Port>, name: &str, driver: Option<PortRef>)
    -> Result<usize, ModelError>
{
    match ports_find(ports, name) {
        Some(port) => {
            if ports[port].is_driven() {
                return Err(ModelError::MultipleDrivers(name.to_string()));
            }

            if ports[port].driver.is_none() {
                ports[port].driver = driver;
            }

            ports[port].flags |= PortFlags::DRIVEN;
            Ok(port)
        }
        None => Ok(ports_add(ports, Some(name),
                             PortFlags::DRIVEN | PortFlags::LOCAL, driver)),
    }
}

/// Register a source: an unknown net becomes a fresh undriven local port.
fn add_source(ports: &mut Vec<Port>, name: &str, driver: Option<PortRef>)
    -> usize
{
    match ports_find(ports, name) {
        Some(port) => port,
        None => ports_add(ports, Some(name), PortFlags::LOCAL, driver),
    }
}

/// A parameter drives one local net per value character: a one-character
/// (or missing) value drives `key` itself, a wider value drives `key[i]`
/// for each character index. Only the width matters; the character values
/// carry no meaning here.
fn bind_params(params: &[Pair], ports: &mut Vec<Port>)
    -> Result<(), ModelError>
{
    for param in params {
        match param.value.as_deref() {
            Some(value) if value.chars().count() != 1 => {
                for (i, _) in value.chars().enumerate() {
                    add_sink(ports, &format!("{}[{}]", param.key, i), None)?;
                }
            }
            _ => {
                add_sink(ports, &param.key, None)?;
            }
        }
    }

    Ok(())
}

fn bind_table(cell_idx: usize, cell: &Cell, ports: &mut Vec<Port>)
    -> Result<(), ModelError>
{
    let mark = cell.binds.iter().position(|b| b.value == TABLE_SINK_MARK);

    for (i, bind) in cell.binds.iter().enumerate() {
        let driver = Some(PortRef { cell: cell_idx, ordinal: i });

        /* Without a mark, everything but the last bind feeds the table. */
        match mark {
            Some(mark) if i == mark => continue,
            Some(mark) if i < mark => {
                add_source(ports, &bind.value, driver);
            }
            Some(_) => {
                add_sink(ports, &bind.value, driver)?;
            }
            None if i + 1 == cell.binds.len() => {
                add_sink(ports, &bind.value, driver)?;
            }
            None => {
                add_source(ports, &bind.value, driver);
            }
        }
    }

    Ok(())
}

fn bind_latch(cell_idx: usize, cell: &Cell, ports: &mut Vec<Port>)
    -> Result<(), ModelError>
{
    if cell.binds.len() < 2 || cell.binds.len() > 5 {
        return Err(ModelError::LatchArity);
    }

    /* 0 = data, 1 = output, 2 = edge qualifier, 3 = clock/enable,
     * 4 = initial value; 2 and 4 are not nets */
    add_source(ports, &cell.binds[0].value,
               Some(PortRef { cell: cell_idx, ordinal: 0 }));
    add_sink(ports, &cell.binds[1].value,
             Some(PortRef { cell: cell_idx, ordinal: 1 }))?;

    if cell.binds.len() >= 4 {
        add_source(ports, &cell.binds[3].value,
                   Some(PortRef { cell: cell_idx, ordinal: 3 }));
    }

    Ok(())
}

fn bind_reference(cell_idx: usize, cell: &Cell, formals: &[Formal],
                  ports: &mut Vec<Port>) -> Result<(), ModelError>
{
    /* Positional binds map onto the non-local formals in declaration
     * order; named binds may address any non-local formal directly. */
    let positional: Vec<&Formal> = formals.iter()
        .filter(|f| !f.local)
        .collect();

    let mut pos = 0;
    for (i, bind) in cell.binds.iter().enumerate() {
        let formal = match &bind.port {
            Some(port) => {
                let formal = formals.iter()
                    .find(|f| f.name == *port)
                    .ok_or_else(|| ModelError::UnknownPort {
                        port: port.clone(),
                        cell: cell.type_name.clone(),
                    })?;

                if formal.local {
                    return Err(ModelError::BindToLocal {
                        value: bind.value.clone(),
                        port: port.clone(),
                        cell: cell.type_name.clone(),
                    });
                }

                formal
            }
            None => {
                let formal = positional.get(pos)
                    .ok_or_else(|| ModelError::TooManyArgs(cell.type_name.clone()))?;
                pos += 1;
                *formal
            }
        };

        let driver = Some(PortRef { cell: cell_idx, ordinal: i });
        if formal.input {
            add_source(ports, &bind.value, driver);
        } else {
            add_sink(ports, &bind.value, driver)?;
        }
    }

    Ok(())
}

fn bind_wire(wire: &Wire, ports: &mut Vec<Port>) -> Result<(), ModelError> {
    add_sink(ports, &wire.sink, None)?;
    add_source(ports, &wire.source, None);

    Ok(())
}

fn verify_driven(ports: &[Port]) -> Result<(), ModelError> {
    match ports.iter().find(|p| !p.is_driven()) {
        Some(port) => Err(ModelError::NoDriver(port.name.clone())),
        None => Ok(()),
    }
}

fn bind_model(o: &mut Model, plan: &ModelPlan) -> Result<(), ModelError> {
    let Model { params, ports, cells, wires, .. } = o;

    bind_params(params, ports)?;

    for (cell_idx, (cell, kind)) in cells.iter().zip(&plan.cells).enumerate() {
        dbg_log!(DBG_EXTRA, "Binding cell {} of type {}",
                 cell.name, cell.type_name);

        match kind {
            CellKind::Table => bind_table(cell_idx, cell, ports)?,
            CellKind::Latch => bind_latch(cell_idx, cell, ports)?,
            CellKind::Reference { formals } =>
                bind_reference(cell_idx, cell, formals, ports)?,
            CellKind::Unknown(err) => return Err(err.clone()),
        }
    }

    for wire in wires.iter() {
        bind_wire(wire, ports)?;
    }

    verify_driven(ports)
}

fn connect_model(o: &mut Model, plan: &ModelPlan) -> Result<(), ModelError> {
    dbg_log!(DBG_INFO, "Connecting model {}", o.name);

    if let Err(err) = bind_model(o, plan) {
        o.fail(err.clone());
        return Err(err);
    }

    for (sub, sub_plan) in o.models.iter_mut().zip(&plan.children) {
        if let Err(err) = connect_model(sub, sub_plan) {
            /* move the child's message one level up, never copy it twice */
            sub.error = None;
            o.fail(err.clone());
            return Err(err);
        }
    }

    Ok(())
}

/// Resolve connectivity for a model tree, top-down: bind parameters, bind
/// cells, bind wires, verify that every port has a driver, then recurse
/// into sub-models in declaration order. The first failure aborts the
/// walk; its message sticks to every model on the way up, ending at the
/// model this was called on (see [`Model::status`]).
pub fn connect(o: &mut Model) -> Result<(), ModelError> {
    let plan = plan_model(o, None);

    connect_model(o, &plan)
}

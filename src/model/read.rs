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

use std::io::BufRead;

#[allow(unused)]
use crate::log::*;

use super::*;

/// One tokenized source command: whitespace-separated words plus the line
/// they came from. Comment stripping, quoting and continuation lines are
/// the job of the full tokenizer, which lives outside this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub args: Vec<String>,
    pub lineno: usize,
}

/// Minimal command splitter, sufficient for round-tripping serialized
/// models: one command per line, words separated by whitespace, blank and
/// `#`-led lines skipped.
pub fn commands<R>(input: R) -> impl Iterator<Item = Command> where
    R: BufRead,
{
    input.lines()
        .enumerate()
        .map_while(|(i, line)| line.ok().map(|line| (i + 1, line)))
        .filter_map(|(lineno, line)| {
            let args: Vec<String> = line.split_whitespace()
                .map(str::to_string)
                .collect();

            match args.first() {
                None => None,
                Some(word) if word.starts_with('#') => None,
                Some(_) => Some(Command { args, lineno }),
            }
        })
}

/// Construction driver. Owns the model tree being built and the focus
/// cursor; declarations apply to whichever model currently holds the
/// focus. The focus moves strictly forward: every `.model` command opens
/// a fresh sub-model of the root and the focus never returns to a closed
/// one.
pub struct ModelBuilder {
    root: Option<Model>,
    focus: Option<usize>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self {
            root: None,
            focus: None,
        }
    }

    /// Feed one command. Returns false once a command has failed; the
    /// message sticks to the root model and the caller is expected to
    /// stop the loop.
    pub fn command(&mut self, cmd: &Command) -> bool {
        let first = match cmd.args.first() {
            Some(first) => first.as_str(),
            None => return true,
        };

        let root = match self.root.as_mut() {
            Some(root) => root,
            None => {
                /* ignore everything until a model is declared */
                if first != ".model" {
                    return true;
                }

                let name = cmd.args.get(1).map_or("empty", |s| s.as_str());
                let mut root = Model::new(name);

                if cmd.args.len() < 2 {
                    root.fail(ModelError::NoModelName);
                }

                let ok = root.status().is_none();
                self.root = Some(root);
                return ok;
            }
        };

        dbg_log!(DBG_EXTRA, "line {}: {}", cmd.lineno, first);

        let result = match first {
            ".model" => on_model(root, &mut self.focus, cmd),
            other => {
                let o = focused(root, self.focus);
                match other {
                    ".inputs" => on_inputs(o, cmd),
                    ".outputs" => on_outputs(o, cmd),
                    ".gate" | ".subckt" => on_cell(o, cmd),
                    ".names" | ".table" => on_table(o, cmd),
                    ".latch" => on_latch(o, cmd),
                    ".wire" | ".conn" => on_wire(o, cmd),
                    ".cname" => on_cname(o, cmd),
                    ".param" => on_param(o, cmd),
                    ".attr" => on_attr(o, cmd),
                    ".bitmap" => on_bitmap(o, cmd),
                    /* .end and unrecognized directives are ignored */
                    dot if dot.starts_with('.') => Ok(()),
                    _ => o.add_tuple(cmd.args.iter().cloned()),
                }
            }
        };

        match result {
            Ok(()) => true,
            Err(err) => {
                root.fail(err);
                false
            }
        }
    }

    pub fn finish(self) -> Option<Model> {
        self.root
    }
}

fn focused(root: &mut Model, focus: Option<usize>) -> &mut Model {
    match focus {
        Some(idx) => &mut root.models[idx],
        None => root,
    }
}

fn on_model(root: &mut Model, focus: &mut Option<usize>, cmd: &Command)
    -> Result<(), ModelError>
{
    if cmd.args.len() < 2 {
        return Err(ModelError::NoModelName);
    }

    *focus = Some(root.add_model(&cmd.args[1]));
    Ok(())
}

fn on_inputs(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    for name in &cmd.args[1..] {
        o.add_input(name);
    }

    Ok(())
}

fn on_outputs(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    for name in &cmd.args[1..] {
        o.add_output(name);
    }

    Ok(())
}

/* PORT=VALUE selects a formal port by name, a bare VALUE binds by
 * position */
fn add_bind_expr(o: &mut Model, expr: &str) -> Result<(), ModelError> {
    match expr.split_once('=') {
        Some((port, value)) => o.add_bind(Some(port), value),
        None => o.add_bind(None, expr),
    }
}

fn on_cell(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    if cmd.args.len() < 2 {
        return Err(ModelError::NoCellType);
    }

    o.add_cell(&cmd.args[1], None);

    for expr in &cmd.args[2..] {
        add_bind_expr(o, expr)?;
    }

    Ok(())
}

fn on_table(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    if cmd.args.len() < 2 {
        return Err(ModelError::EmptyTable);
    }

    o.add_cell(TYPE_TABLE, None);

    for expr in &cmd.args[1..] {
        add_bind_expr(o, expr)?;
    }

    Ok(())
}

fn on_latch(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    if cmd.args.len() < 3 {
        return Err(ModelError::NoLatchArgs);
    }

    o.add_cell(TYPE_LATCH, None);

    for expr in &cmd.args[1..] {
        add_bind_expr(o, expr)?;
    }

    Ok(())
}

fn on_wire(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    if cmd.args.len() < 3 {
        return Err(ModelError::NoWireArgs);
    }

    o.add_wire(&cmd.args[1], &cmd.args[2]);
    Ok(())
}

fn on_cname(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    if cmd.args.len() < 2 {
        return Err(ModelError::NoCommonName);
    }

    o.rename_last_cell(&cmd.args[1])
}

fn on_param(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    if cmd.args.len() < 2 {
        return Err(ModelError::NoParamName);
    }

    o.add_param(&cmd.args[1], cmd.args.get(2).map(|s| s.as_str()));
    Ok(())
}

fn on_attr(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    if cmd.args.len() < 2 {
        return Err(ModelError::NoAttrName);
    }

    o.add_attr(&cmd.args[1], cmd.args.get(2).map(|s| s.as_str()))
}

fn on_bitmap(o: &mut Model, cmd: &Command) -> Result<(), ModelError> {
    if cmd.args.len() < 2 {
        return Err(ModelError::NoBitmapPath);
    }

    o.load_bitmap(&cmd.args[1])
}

/// Drive a full command stream into a model tree. Returns None when the
/// stream never declares a model; otherwise the tree, possibly carrying a
/// sticky construction error (check [`Model::status`]).
pub fn read_model<I>(cmds: I) -> Option<Model> where
    I: IntoIterator<Item = Command>,
{
    let mut builder = ModelBuilder::new();

    for cmd in cmds {
        if !builder.command(&cmd) {
            break;
        }
    }

    builder.finish()
}

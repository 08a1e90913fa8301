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

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::model::Model;

/// Decides which model names get exported; `:all` selects every one.
#[derive(Default)]
struct ExportChecker {
    export: HashSet<String>,
    export_all: bool,
}

impl ExportChecker {
    fn new(arg_list: &Option<Vec<String>>) -> Self {
        let mut export_all = false;
        let mut export = HashSet::new();
        if let Some(args) = arg_list {
            for arg in args {
                if arg == ":all" {
                    export_all = true;
                } else {
                    export.insert(arg.clone());
                }
            }
        }

        Self { export, export_all }
    }

    fn should_export(&self, name: &str) -> bool {
        self.export_all || self.export.contains(name)
    }
}

#[derive(Serialize)]
pub struct BindReport {
    pub port: Option<String>,
    pub value: String,
}

#[derive(Serialize)]
pub struct PortReport {
    pub name: String,
    pub input: bool,
    pub driven: bool,
    pub local: bool,
    /// Name of the cell instance that first supplied or consumed the port.
    pub driver: Option<String>,
}

#[derive(Serialize)]
pub struct CellReport {
    pub kind: String,
    pub name: String,
    pub binds: Vec<BindReport>,
}

/// Flat connectivity summary of one resolved model.
#[derive(Serialize)]
pub struct ModelReport {
    pub name: String,
    pub ports: Vec<PortReport>,
    pub cells: Vec<CellReport>,
}

impl ModelReport {
    pub fn new(o: &Model) -> Self {
        Self {
            name: o.name.clone(),
            ports: o.ports.iter()
                .map(|p| PortReport {
                    name: p.name.clone(),
                    input: p.is_input(),
                    driven: p.is_driven(),
                    local: p.is_local(),
                    driver: p.driver.map(|r| o.cells[r.cell].name.clone()),
                })
                .collect(),
            cells: o.cells.iter()
                .map(|c| CellReport {
                    kind: c.type_name.clone(),
                    name: c.name.clone(),
                    binds: c.binds.iter()
                        .map(|b| BindReport {
                            port: b.port.clone(),
                            value: b.value.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Collects reports for the selected models and writes them out as a
/// single JSON document on flush.
pub struct JsonReportExporter {
    filename: PathBuf,
    data: HashMap<String, ModelReport>,
    checker: ExportChecker,
}

impl JsonReportExporter {
    pub fn new(arg_list: &Option<Vec<String>>, filename: PathBuf) -> Self {
        Self {
            filename,
            data: HashMap::new(),
            checker: ExportChecker::new(arg_list),
        }
    }

    pub fn ignore_or_export<'s, F>(&'s mut self, name: &str, report: F) where
        F: FnOnce() -> ModelReport + 's,
    {
        if self.checker.should_export(name) {
            self.data.insert(name.into(), report());
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        if self.data.is_empty() {
            return Ok(());
        }

        let data = serde_json::to_string_pretty(&self.data).unwrap();
        let mut file = File::create(&self.filename)?;
        file.write_all(data.as_bytes())
    }
}

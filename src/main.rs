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

use clap::Parser;

use dakota_model::exporter::{JsonReportExporter, ModelReport};
use dakota_model::loader::{self, OpenOpts};
use dakota_model::model::connect::connect;
use dakota_model::model::read::{commands, read_model};
use dakota_model::model::write::model_write_path;
use dakota_model::model::Model;

#[derive(Parser, Debug)]
#[clap(
    author = "Dakota Chip",
    version = "0.0.1",
    about = "Dakota hierarchical netlist model and connectivity resolver",
    long_about = None
)]
struct Args {
    #[clap(help = "Model source file")]
    model: String,
    #[clap(long, help = "Read gzip-compressed model source")]
    gz: bool,
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Parser, Debug)]
struct CheckCmd {
    #[arg(
        long,
        help = "Model names to have their connectivity reports exported to JSON format"
    )]
    json: Option<Vec<String>>,
    #[arg(long, default_value = "", help = "Directory for saving the .json report")]
    json_prefix: String,
}

#[derive(Parser, Debug)]
struct WriteCmd {
    #[arg(help = "Output file, - for stdout")]
    output: String,
}

#[derive(Parser, Debug)]
enum SubCommands {
    Check(CheckCmd),
    Write(WriteCmd),
}

fn for_each_model<'m>(o: &'m Model, f: &mut impl FnMut(&'m Model)) {
    f(o);

    for sub in &o.models {
        for_each_model(sub, f);
    }
}

fn check(args: CheckCmd, model: &Model) {
    let mut json_exporter = JsonReportExporter::new(
        &args.json,
        Path::new(&args.json_prefix).join(
            format!("{}_connectivity.json", model.name)
        )
    );

    for_each_model(model, &mut |m| {
        println!(concat!(
            "Model {}:\n",
            "    No. of ports:      {}\n",
            "    No. of cells:      {}\n",
            "    No. of sub-models: {}"
            ),
            m.name,
            m.ports.len(),
            m.cells.len(),
            m.models.len()
        );

        json_exporter.ignore_or_export(&m.name, || ModelReport::new(m));
    });

    json_exporter.flush().unwrap();
}

fn main() {
    let args = Args::parse();

    let input = loader::open(
        Path::new(&args.model),
        OpenOpts { gz: args.gz }
    ).expect("Couldn't open model file");

    let mut model = read_model(commands(input))
        .expect("Model file does not declare a model");

    if let Some(err) = model.status() {
        eprintln!("{}: {}", args.model, err);
        std::process::exit(1);
    }

    if let Err(err) = connect(&mut model) {
        eprintln!("{}: {}", args.model, err);
        std::process::exit(1);
    }

    match args.command {
        SubCommands::Check(sargs) => check(sargs, &model),
        SubCommands::Write(sargs) => model_write_path(&model, &sargs.output)
            .expect("Couldn't write model file"),
    }
}

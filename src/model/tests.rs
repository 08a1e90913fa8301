use super::*;
use super::connect::connect;
use super::read::{commands, read_model, Command};
use super::write::model_write;

fn flags_of(o: &Model, name: &str) -> PortFlags {
    o.ports[o.find_port(name).expect(name)].flags
}

/* inputs a b, output y, one table cell `a b -> y` */
fn table_model(with_mark: bool) -> Model {
    let mut o = Model::new("top");

    o.add_input("a");
    o.add_input("b");
    o.add_output("y");

    o.add_cell(TYPE_TABLE, None);
    o.add_bind(None, "a").unwrap();
    o.add_bind(None, "b").unwrap();
    if with_mark {
        o.add_bind(None, "->").unwrap();
    }
    o.add_bind(None, "y").unwrap();
    o.add_tuple(["11", "1"]).unwrap();

    o
}

/* appends an `and2` definition (A B -> Y) to the given scope */
fn add_and2(scope: &mut Model) -> usize {
    let idx = scope.add_model("and2");
    let def = &mut scope.models[idx];

    def.add_input("A");
    def.add_input("B");
    def.add_output("Y");

    def.add_cell(TYPE_TABLE, None);
    def.add_bind(None, "A").unwrap();
    def.add_bind(None, "B").unwrap();
    def.add_bind(None, "->").unwrap();
    def.add_bind(None, "Y").unwrap();
    def.add_tuple(["11", "1"]).unwrap();

    idx
}

#[test]
fn test_auto_port_and_cell_names() {
    let mut o = Model::new("top");

    assert_eq!(o.add_port(None, PortFlags::empty(), None), 0);
    assert_eq!(o.add_port(None, PortFlags::empty(), None), 1);
    assert_eq!(o.ports[0].name, "P0");
    assert_eq!(o.ports[1].name, "P1");

    o.add_cell(TYPE_TABLE, None);
    o.add_cell(TYPE_TABLE, Some("core"));
    o.add_cell(TYPE_TABLE, None);
    assert_eq!(o.cells[0].name, "U0");
    assert!(!o.cells[0].is_named());
    assert_eq!(o.cells[1].name, "core");
    assert!(o.cells[1].is_named());
    assert_eq!(o.cells[2].name, "U2");
}

#[test]
fn test_input_ports_are_born_driven() {
    let mut o = Model::new("top");

    o.add_input("a");
    o.add_output("y");

    assert_eq!(flags_of(&o, "a"), PortFlags::INPUT | PortFlags::DRIVEN);
    assert_eq!(flags_of(&o, "y"), PortFlags::empty());
}

#[test]
fn test_param_attaches_to_model_then_last_cell() {
    let mut o = Model::new("top");

    o.add_param("width", Some("4"));
    o.add_cell(TYPE_TABLE, None);
    o.add_param("depth", Some("2"));

    assert_eq!(o.params, vec![Pair::new("width", Some("4"))]);
    assert_eq!(o.cells[0].params, vec![Pair::new("depth", Some("2"))]);
}

#[test]
fn test_attr_requires_cell() {
    let mut o = Model::new("top");

    let err = o.add_attr("rise", Some("fast")).unwrap_err();
    assert_eq!(err.to_string(), "no cell to add attribute");

    o.add_cell(TYPE_TABLE, None);
    o.add_attr("rise", Some("fast")).unwrap();
    assert_eq!(o.cells[0].get_attr("rise"), Some("fast"));
}

#[test]
fn test_arity_attrs_become_hints() {
    let mut o = Model::new("top");

    o.add_cell(TYPE_TABLE, None);
    o.add_attr(ATTR_CELL_INPUTS, Some("2")).unwrap();
    o.add_attr(ATTR_CELL_OUTPUTS, Some("1")).unwrap();

    assert_eq!(o.cells[0].ni, Some(2));
    assert_eq!(o.cells[0].no, Some(1));
    assert!(o.cells[0].attrs.is_empty());

    let err = o.add_attr(ATTR_CELL_INPUTS, Some("two")).unwrap_err();
    assert_eq!(err.to_string(), "cell-inputs requires number");
}

#[test]
fn test_bind_and_tuple_require_cell() {
    let mut o = Model::new("top");

    let err = o.add_bind(None, "a").unwrap_err();
    assert_eq!(err.to_string(), "no cell to bind to");

    let err = o.add_tuple(["11", "1"]).unwrap_err();
    assert_eq!(err.to_string(), "no cell to add tuple");
}

#[test]
fn test_table_default_split_matches_explicit_mark() {
    let mut marked = table_model(true);
    let mut defaulted = table_model(false);

    connect(&mut marked).unwrap();
    connect(&mut defaulted).unwrap();

    for name in ["a", "b", "y"] {
        assert_eq!(flags_of(&marked, name), flags_of(&defaulted, name));
    }
    assert!(flags_of(&marked, "y").contains(PortFlags::DRIVEN));
}

#[test]
fn test_table_sink_records_driving_cell() {
    let mut o = table_model(true);

    connect(&mut o).unwrap();

    let y = &o.ports[o.find_port("y").unwrap()];
    assert_eq!(y.driver, Some(PortRef { cell: 0, ordinal: 3 }));
}

#[test]
fn test_latch_minimal() {
    let mut o = Model::new("ff");

    o.add_input("d");
    o.add_output("q");
    o.add_cell(TYPE_LATCH, None);
    o.add_bind(None, "d").unwrap();
    o.add_bind(None, "q").unwrap();

    connect(&mut o).unwrap();
    assert!(flags_of(&o, "q").contains(PortFlags::DRIVEN));
}

#[test]
fn test_latch_with_clock() {
    let mut o = Model::new("ff");

    o.add_input("d");
    o.add_input("clk");
    o.add_output("q");
    o.add_cell(TYPE_LATCH, None);
    for value in ["d", "q", "re", "clk"] {
        o.add_bind(None, value).unwrap();
    }

    connect(&mut o).unwrap();

    /* position 2 is an edge qualifier, not a net */
    assert!(o.find_port("re").is_none());
    assert!(flags_of(&o, "q").contains(PortFlags::DRIVEN));
    assert!(flags_of(&o, "clk").contains(PortFlags::INPUT));
}

#[test]
fn test_latch_arity_rejected() {
    for binds in [&["d"][..], &["d", "q", "re", "clk", "1", "x"][..]] {
        let mut o = Model::new("ff");

        o.add_cell(TYPE_LATCH, None);
        for value in binds {
            o.add_bind(None, value).unwrap();
        }

        let err = connect(&mut o).unwrap_err();
        assert_eq!(err.to_string(), "wrong number of arguments for latch");
        assert_eq!(o.status(), Some(&err));
    }
}

#[test]
fn test_multiple_drivers_conflict() {
    let mut o = Model::new("top");

    o.add_input("a");
    o.add_output("y");
    for _ in 0..2 {
        o.add_cell(TYPE_TABLE, None);
        o.add_bind(None, "a").unwrap();
        o.add_bind(None, "y").unwrap();
    }

    let err = connect(&mut o).unwrap_err();
    assert_eq!(err.to_string(), "multiple drivers for y");
}

#[test]
fn test_undriven_output_detected() {
    let mut o = Model::new("top");

    o.add_input("a");
    o.add_output("z");

    let err = connect(&mut o).unwrap_err();
    assert_eq!(err.to_string(), "no driver for z");
    assert_eq!(o.status(), Some(&err));
}

#[test]
fn test_unknown_cell_type() {
    let mut o = Model::new("top");

    o.add_cell("dff", None);

    let err = connect(&mut o).unwrap_err();
    assert_eq!(err.to_string(), "cannot find model dff for cell U0");
}

#[test]
fn test_param_width_expansion() {
    let mut o = Model::new("cfg");

    o.add_param("mode", Some("0101"));
    o.add_param("en", Some("1"));
    o.add_param("raw", None);

    connect(&mut o).unwrap();

    assert!(o.find_port("mode").is_none());
    for i in 0..4 {
        let name = format!("mode[{}]", i);
        assert_eq!(flags_of(&o, &name), PortFlags::DRIVEN | PortFlags::LOCAL);
    }
    assert!(o.find_port("mode[4]").is_none());

    assert_eq!(flags_of(&o, "en"), PortFlags::DRIVEN | PortFlags::LOCAL);
    assert_eq!(flags_of(&o, "raw"), PortFlags::DRIVEN | PortFlags::LOCAL);
}

#[test]
fn test_param_driver_conflict() {
    let mut o = Model::new("cfg");

    o.add_input("en");
    o.add_param("en", Some("1"));

    let err = connect(&mut o).unwrap_err();
    assert_eq!(err.to_string(), "multiple drivers for en");
}

#[test]
fn test_wire_binding() {
    let mut o = Model::new("top");

    o.add_input("a");
    o.add_output("y");
    o.add_wire("y", "a");

    connect(&mut o).unwrap();
    assert!(flags_of(&o, "y").contains(PortFlags::DRIVEN));
}

#[test]
fn test_wire_driver_conflict() {
    let mut o = Model::new("top");

    o.add_input("a");
    o.add_input("b");
    o.add_output("y");
    o.add_wire("y", "a");
    o.add_wire("y", "b");

    let err = connect(&mut o).unwrap_err();
    assert_eq!(err.to_string(), "multiple drivers for y");
}

#[test]
fn test_reference_positional_binds() {
    let mut o = Model::new("top");

    add_and2(&mut o);
    o.add_input("i0");
    o.add_input("i1");
    o.add_output("out");
    o.add_cell("and2", None);
    for value in ["i0", "i1", "out"] {
        o.add_bind(None, value).unwrap();
    }

    connect(&mut o).unwrap();
    assert!(flags_of(&o, "out").contains(PortFlags::DRIVEN));
}

#[test]
fn test_reference_named_binds() {
    let mut o = Model::new("top");

    add_and2(&mut o);
    o.add_input("i0");
    o.add_input("i1");
    o.add_output("out");
    o.add_cell("and2", None);
    o.add_bind(Some("Y"), "out").unwrap();
    o.add_bind(Some("A"), "i0").unwrap();
    o.add_bind(Some("B"), "i1").unwrap();

    connect(&mut o).unwrap();
    assert!(flags_of(&o, "out").contains(PortFlags::DRIVEN));
}

#[test]
fn test_reference_too_many_args() {
    let mut o = Model::new("top");

    add_and2(&mut o);
    o.add_input("i0");
    o.add_cell("and2", None);
    for value in ["i0", "i0", "out", "extra"] {
        o.add_bind(None, value).unwrap();
    }

    let err = connect(&mut o).unwrap_err();
    assert_eq!(err.to_string(), "too many args for cell and2");
}

#[test]
fn test_reference_unknown_port() {
    let mut o = Model::new("top");

    add_and2(&mut o);
    o.add_cell("and2", None);
    o.add_bind(Some("Q"), "x").unwrap();

    let err = connect(&mut o).unwrap_err();
    assert_eq!(err.to_string(), "cannot find port Q for cell and2");
}

#[test]
fn test_reference_local_port_rejected() {
    let mut o = Model::new("top");

    let idx = add_and2(&mut o);
    o.models[idx].add_port(Some("t"), PortFlags::LOCAL | PortFlags::DRIVEN, None);

    o.add_cell("and2", None);
    o.add_bind(Some("t"), "x").unwrap();

    let err = connect(&mut o).unwrap_err();
    assert_eq!(err.to_string(), "cannot bind x to local port t for cell and2");
}

#[test]
fn test_reference_positional_binds_skip_local_formals() {
    let mut o = Model::new("top");

    let idx = add_and2(&mut o);
    /* a local scratch net inside the definition must not take a position
     * in the formal interface */
    o.models[idx].add_port(Some("t"), PortFlags::LOCAL | PortFlags::DRIVEN, None);
    o.models[idx].add_output("Z");
    {
        let def = &mut o.models[idx];
        def.add_cell(TYPE_TABLE, None);
        def.add_bind(None, "A").unwrap();
        def.add_bind(None, "Z").unwrap();
    }

    o.add_input("i0");
    o.add_input("i1");
    o.add_output("out");
    o.add_output("aux");
    o.add_cell("and2", None);
    for value in ["i0", "i1", "out", "aux"] {
        o.add_bind(None, value).unwrap();
    }

    connect(&mut o).unwrap();
    assert!(flags_of(&o, "out").contains(PortFlags::DRIVEN));
    assert!(flags_of(&o, "aux").contains(PortFlags::DRIVEN));
}

#[test]
fn test_scope_shadowing() {
    let mut root = Model::new("root");

    let t = root.add_model("top");
    {
        let top = &mut root.models[t];
        let i = top.add_model("inv");
        {
            let inv = &mut top.models[i];
            inv.add_input("A");
            inv.add_output("Y");
            inv.add_cell(TYPE_TABLE, None);
            inv.add_bind(None, "A").unwrap();
            inv.add_bind(None, "->").unwrap();
            inv.add_bind(None, "Y").unwrap();
        }

        top.add_input("x");
        top.add_output("z");
        top.add_cell("inv", None);
        top.add_bind(None, "x").unwrap();
        top.add_bind(None, "z").unwrap();
    }

    let s = root.add_model("sib");
    {
        let sib = &mut root.models[s];
        sib.add_input("p");
        sib.add_output("q");
        sib.add_cell("inv", None);
        sib.add_bind(None, "p").unwrap();
        sib.add_bind(None, "q").unwrap();
    }

    let err = connect(&mut root).unwrap_err();
    assert_eq!(err.to_string(), "cannot find model inv for cell U0");

    /* top resolved inv just fine before the sibling failed */
    assert!(root.models[t].status().is_none());
    let top = &root.models[t];
    assert!(top.ports[top.find_port("z").unwrap()].is_driven());

    /* the failure moved out of the sibling up to the connect root */
    assert!(root.models[s].status().is_none());
    assert_eq!(root.status(), Some(&err));
}

#[test]
fn test_driven_completeness() {
    let mut o = Model::new("top");

    add_and2(&mut o);
    o.add_input("i0");
    o.add_input("i1");
    o.add_output("out");
    o.add_param("mode", Some("01"));
    o.add_cell("and2", None);
    for value in ["i0", "i1", "out"] {
        o.add_bind(None, value).unwrap();
    }

    connect(&mut o).unwrap();

    fn all_driven(o: &Model) -> bool {
        o.ports.iter().all(|p| p.is_driven())
            && o.models.iter().all(all_driven)
    }
    assert!(all_driven(&o));
}

#[test]
fn test_cell_bitmap_handle() {
    let path = std::env::temp_dir()
        .join(format!("dakota-bitmap-{}.bin", std::process::id()));
    std::fs::write(&path, b"\x00\x01\x7f").unwrap();

    let mut o = Model::new("top");
    o.add_cell(TYPE_TABLE, None);
    o.load_bitmap(&path).unwrap();

    let bitmap = o.cells[0].bitmap.as_ref().unwrap();
    assert_eq!(bitmap.data, b"\x00\x01\x7f");

    let _ = std::fs::remove_file(&path);

    /* the handle is opaque: loading is the only thing that can fail */
    let err = Model::new("x").load_bitmap(&path).unwrap_err();
    assert_eq!(err.to_string(), "no cell to load bitmap");

    let mut o = Model::new("y");
    o.add_cell(TYPE_TABLE, None);
    let err = o.load_bitmap(&path).unwrap_err();
    assert_eq!(err.to_string(),
               format!("cannot load bitmap {}", path.display()));
}

const SRC: &str = "\
# tiny two-level netlist
.model top
.inputs i0 i1
.outputs out

.subckt and2 i0 i1 out
.cname u_and

.model and2
.inputs A B
.outputs Y

.table A B -> Y
11 1

.end
";

#[test]
fn test_reader_basic() {
    let o = read_model(commands(SRC.as_bytes())).unwrap();

    assert!(o.status().is_none());
    assert_eq!(o.name, "top");
    assert_eq!(o.ports.len(), 3);
    assert_eq!(o.cells.len(), 1);
    assert_eq!(o.cells[0].type_name, "and2");
    assert_eq!(o.cells[0].name, "u_and");
    assert!(o.cells[0].is_named());

    assert_eq!(o.models.len(), 1);
    let and2 = &o.models[0];
    assert_eq!(and2.name, "and2");
    assert_eq!(and2.cells[0].type_name, TYPE_TABLE);
    assert_eq!(and2.cells[0].binds.len(), 4);
    assert_eq!(and2.cells[0].tuples,
               vec![Tuple { items: vec!["11".into(), "1".into()] }]);
}

#[test]
fn test_reader_ignores_preamble_and_unknown_directives() {
    let src = "\
stray tuple before any model
.version 1
.model top
.inputs a
.outputs y
.frobnicate all the things
.table a y
.end
";
    let o = read_model(commands(src.as_bytes())).unwrap();

    assert!(o.status().is_none());
    assert_eq!(o.cells.len(), 1);
}

#[test]
fn test_reader_needs_a_model() {
    assert!(read_model(commands(".inputs a b\n".as_bytes())).is_none());

    let o = read_model(commands(".model\n".as_bytes())).unwrap();
    assert_eq!(o.name, "empty");
    assert_eq!(o.status().map(|e| e.to_string()),
               Some("no model name given".to_string()));
}

#[test]
fn test_reader_focus_moves_forward() {
    let src = "\
.model top
.inputs a
.model sub
.inputs b
";
    let o = read_model(commands(src.as_bytes())).unwrap();

    assert_eq!(o.ports.len(), 1);
    assert_eq!(o.models.len(), 1);
    assert_eq!(o.models[0].name, "sub");
    assert_eq!(o.models[0].ports.len(), 1);
    assert_eq!(o.models[0].ports[0].name, "b");
}

#[test]
fn test_reader_grammar_errors_stick_to_root() {
    for (src, msg) in [
        (".model t\n.latch d\n", "no latch input and output given"),
        (".model t\n.table\n", "empty table"),
        (".model t\n.subckt\n", "no cell type given"),
        (".model t\n.attr speed slow\n", "no cell to add attribute"),
        (".model t\n.cname u1\n", "no cell to name"),
        (".model t\n.wire y\n", "no wire sink and source given"),
        (".model t\n11 1\n", "no cell to add tuple"),
    ] {
        let o = read_model(commands(src.as_bytes())).unwrap();
        assert_eq!(o.status().map(|e| e.to_string()), Some(msg.to_string()),
                   "source: {:?}", src);
    }
}

#[test]
fn test_reader_stops_at_first_error() {
    let src = "\
.model t
.table
.inputs a
";
    let o = read_model(commands(src.as_bytes())).unwrap();

    assert_eq!(o.status().map(|e| e.to_string()),
               Some("empty table".to_string()));
    /* nothing after the failing command was applied */
    assert!(o.ports.is_empty());
}

#[test]
fn test_command_splitter() {
    let cmds: Vec<Command> = commands("\n.model top\n# note\n  a  b \n".as_bytes())
        .collect();

    assert_eq!(cmds.len(), 2);
    assert_eq!(cmds[0].args, vec![".model", "top"]);
    assert_eq!(cmds[0].lineno, 2);
    assert_eq!(cmds[1].args, vec!["a", "b"]);
    assert_eq!(cmds[1].lineno, 4);
}

#[test]
fn test_writer_shape() {
    let mut o = table_model(true);
    connect(&mut o).unwrap();

    let mut out = Vec::new();
    model_write(&o, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.starts_with(".model top\n"));
    assert!(text.contains("\n.inputs a b\n"));
    assert!(text.contains("\n.outputs y\n"));
    assert!(text.contains("\n.table a b -> y\n"));
    assert!(text.contains("\n11 1\n"));
    assert!(text.ends_with(".end\n"));
}

/* stable per-model digest of everything the round trip must preserve */
fn signature(o: &Model, sig: &mut Vec<String>) {
    sig.push(format!("model {}", o.name));

    let mut ports: Vec<String> = o.ports.iter()
        .map(|p| format!("port {} i{} d{} l{}", p.name,
                         p.is_input() as u8, p.is_driven() as u8,
                         p.is_local() as u8))
        .collect();
    ports.sort();
    sig.append(&mut ports);

    for cell in &o.cells {
        let name = if cell.is_named() { cell.name.as_str() } else { "<auto>" };
        sig.push(format!("cell {} {} binds {:?} tuples {:?}",
                         cell.type_name, name,
                         cell.binds.iter()
                             .map(|b| (b.port.as_deref(), b.value.as_str()))
                             .collect::<Vec<_>>(),
                         cell.tuples.iter()
                             .map(|t| t.items.join(" "))
                             .collect::<Vec<_>>()));
    }

    for wire in &o.wires {
        sig.push(format!("wire {} {}", wire.sink, wire.source));
    }

    for sub in &o.models {
        signature(sub, sig);
    }
}

#[test]
fn test_round_trip() {
    let mut first = read_model(commands(SRC.as_bytes())).unwrap();
    connect(&mut first).unwrap();

    let mut out = Vec::new();
    model_write(&first, &mut out).unwrap();

    let mut second = read_model(commands(out.as_slice())).unwrap();
    assert!(second.status().is_none());
    connect(&mut second).unwrap();

    let mut sig_first = Vec::new();
    let mut sig_second = Vec::new();
    signature(&first, &mut sig_first);
    signature(&second, &mut sig_second);
    assert_eq!(sig_first, sig_second);
}

#[test]
fn test_round_trip_params_and_attrs() {
    let src = "\
.model cfg
.param mode 0101
.inputs a
.outputs y

.table a -> y
.attr speed slow
.attr cell-inputs 1
.param strength weak
1 1
.end
";
    let mut first = read_model(commands(src.as_bytes())).unwrap();
    assert!(first.status().is_none());
    assert_eq!(first.cells[0].ni, Some(1));
    assert_eq!(first.cells[0].get_attr("speed"), Some("slow"));
    assert_eq!(first.cells[0].params,
               vec![Pair::new("strength", Some("weak"))]);
    connect(&mut first).unwrap();

    let mut out = Vec::new();
    model_write(&first, &mut out).unwrap();

    let mut second = read_model(commands(out.as_slice())).unwrap();
    assert!(second.status().is_none());
    connect(&mut second).unwrap();

    assert_eq!(second.params, first.params);
    assert_eq!(second.cells[0].ni, Some(1));
    assert_eq!(second.cells[0].attrs, first.cells[0].attrs);
    assert_eq!(second.cells[0].params, first.cells[0].params);

    let mut sig_first = Vec::new();
    let mut sig_second = Vec::new();
    signature(&first, &mut sig_first);
    signature(&second, &mut sig_second);
    assert_eq!(sig_first, sig_second);
}

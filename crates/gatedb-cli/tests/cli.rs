use std::io::{self};

use gatedb_cli::{run, Args};

fn exec(sql: &str) -> String {
    let args = Args { data: None, execute: Some(sql.to_string()), log_level: "warn".to_string() };
    let mut out = Vec::new();
    run(args, io::empty(), &mut out).expect("run should succeed");
    String::from_utf8(out).unwrap()
}

#[test]
fn one_shot_execute_persists_nothing_across_invocations() {
    exec("CREATE TABLE t (x INTEGER); INSERT INTO t (x) VALUES (1);");
    let output = exec("CREATE TABLE t (x INTEGER);");
    // A fresh in-memory engine each call: no "table already exists" error.
    assert!(output.contains("table_created"));
}

#[test]
fn file_backend_persists_across_separate_cli_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let args1 = Args { data: Some(dir.path().to_path_buf()), execute: Some("CREATE TABLE t (x INTEGER); INSERT INTO t (x) VALUES (7);".to_string()), log_level: "warn".to_string() };
    let mut out1 = Vec::new();
    run(args1, io::empty(), &mut out1).unwrap();

    let args2 = Args { data: Some(dir.path().to_path_buf()), execute: Some("SELECT * FROM t;".to_string()), log_level: "warn".to_string() };
    let mut out2 = Vec::new();
    run(args2, io::empty(), &mut out2).unwrap();
    let output = String::from_utf8(out2).unwrap();
    assert!(output.contains("7"));
    assert!(output.contains("(1 row)"));
}

#[test]
fn repl_reads_until_semicolon_across_lines() {
    let args = Args { data: None, execute: None, log_level: "warn".to_string() };
    let input = "CREATE TABLE t (x INTEGER);\nINSERT INTO t (x)\nVALUES (1);\nSELECT *\nFROM t;\n";
    let mut out = Vec::new();
    run(args, io::Cursor::new(input), &mut out).unwrap();
    let output = String::from_utf8(out).unwrap();
    assert!(output.contains("table_created"));
    assert!(output.contains("row_inserted"));
    assert!(output.contains("(1 row)"));
}

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use std::io::Write;
use tempfile::NamedTempFile;

fn cli() -> Command {
    Command::cargo_bin("lazuli").expect("binary")
}

fn source_file(source: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(source.as_bytes()).expect("write");
    file
}

#[test]
fn identity_program_copies_stdin_to_stdout() {
    let file = source_file("main xs = xs\n");
    cli()
        .arg(file.path())
        .write_stdin("hello\n")
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn read_int_program_uses_the_prelude_pipeline() {
    let file = source_file("main xs = showInt (readInt xs + 1)\n");
    cli().arg(file.path()).write_stdin("41").assert().success().stdout("42");
}

#[test]
fn prelude_functions_are_available() {
    let file = source_file("main xs = unwords (words xs)\n");
    cli().arg(file.path()).write_stdin(" a  b\n").assert().success().stdout("a b");
}

#[test]
fn compile_errors_carry_file_line_and_column() {
    let file = source_file("main = nope\n");
    let name = file.path().display().to_string();
    cli()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(contains(format!("{name}:1:8")).and(contains("undefined identifier")));
}

#[test]
fn missing_main_is_a_compile_error() {
    let file = source_file("f = 1\n");
    cli().arg(file.path()).assert().failure().stderr(contains("no definition for main"));
}

#[test]
fn runtime_errors_exit_nonzero_with_a_message() {
    let file = source_file("main xs = error \"boom\"\n");
    cli().arg(file.path()).assert().failure().stderr(contains("error: boom"));
}

#[test]
fn partial_output_is_not_suppressed() {
    let file = source_file("main xs = \"ab\" ++ error \"late\"\n");
    cli()
        .arg(file.path())
        .assert()
        .failure()
        .stdout("ab")
        .stderr(contains("error: late"));
}

#[test]
fn dump_ast_emits_json() {
    let file = source_file("main xs = xs\n");
    cli()
        .arg(file.path())
        .arg("--dump-ast")
        .assert()
        .success()
        .stdout(contains("definitions").and(contains("main")));
}

#[test]
fn dump_tokens_lists_the_stream() {
    let file = source_file("main xs = xs\n");
    cli()
        .arg(file.path())
        .arg("--dump-tokens")
        .assert()
        .success()
        .stdout(contains("identifier `main`").and(contains("`=`")));
}

#[test]
fn no_prelude_disables_library_definitions() {
    let file = source_file("main xs = id xs\n");
    cli()
        .arg(file.path())
        .arg("--no-prelude")
        .assert()
        .failure()
        .stderr(contains("undefined identifier"));
}

#[test]
fn missing_file_is_reported() {
    cli().arg("no-such-file.lzl").assert().failure();
}

#[test]
fn missing_trailing_newline_is_tolerated() {
    let file = source_file("main xs = xs");
    cli().arg(file.path()).write_stdin("ok").assert().success().stdout("ok");
}

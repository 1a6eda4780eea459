use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const SET_ID: [u8; 16] = [0x42; 16];

fn frame(type_id: &[u8; 16], body: &[u8]) -> Vec<u8> {
    let mut hashed = SET_ID.to_vec();
    hashed.extend_from_slice(type_id);
    hashed.extend_from_slice(body);
    let mut p = b"PAR2\0PKT".to_vec();
    p.extend_from_slice(&(64 + body.len() as u64).to_le_bytes());
    p.extend_from_slice(&md5::compute(&hashed).0);
    p.extend_from_slice(&hashed);
    p
}

fn file_description(n: u8, name: &str, size: u64) -> Vec<u8> {
    let mut body = vec![n; 16];
    body.extend_from_slice(&[0xaa; 32]);
    body.extend_from_slice(&size.to_le_bytes());
    body.extend_from_slice(name.as_bytes());
    while body.len() % 4 != 0 { body.push(0); }
    frame(b"PAR 2.0\0FileDesc", &body)
}

fn recovery_slice(exponent: u32, data: &[u8]) -> Vec<u8> {
    let mut body = exponent.to_le_bytes().to_vec();
    body.extend_from_slice(data);
    frame(b"PAR 2.0\0RecvSlic", &body)
}

fn parchive() -> Command {
    Command::cargo_bin("parchive").unwrap()
}

#[test]
fn info_reports_set_name_and_range() {
    parchive()
        .args(["info", "movie.vol07+08.par2", "movie.par2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("set=movie exponents=7..=14"))
        .stdout(predicate::str::contains("movie.par2: set=movie exponents=index"));
}

#[test]
fn info_json() {
    let out = parchive().args(["info", "--json", "a.vol0+5.par2"]).output().unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v[0]["name"], "a");
    assert_eq!(v[0]["exponents"]["min"], 0);
    assert_eq!(v[0]["exponents"]["max"], 4);
    assert_eq!(v[0]["index"], false);
}

#[test]
fn files_lists_each_source_once() {
    let td = assert_fs::TempDir::new().unwrap();
    let f = td.child("set.par2");
    let bytes = [file_description(1, "one.txt", 11), recovery_slice(0, &[9; 32]), file_description(2, "two.txt", 22), file_description(1, "one.txt", 11)].concat();
    f.write_binary(&bytes).unwrap();

    parchive()
        .args(["files", f.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("one.txt").count(1))
        .stdout(predicate::str::contains("two.txt"));

    let out = parchive().args(["files", "--json", f.path().to_str().unwrap()]).output().unwrap();
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v.as_array().unwrap().len(), 2);
    assert_eq!(v[1]["size"], 22);
}

#[test]
fn files_on_missing_relative_path_fails() {
    let td = assert_fs::TempDir::new().unwrap();
    parchive()
        .current_dir(td.path())
        .args(["files", "nowhere/set.par2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid operation"));
}

#[test]
fn packets_flags_corruption() {
    let td = assert_fs::TempDir::new().unwrap();
    let f = td.child("set.vol0+2.par2");
    let mut bad = recovery_slice(1, &[7; 64]);
    let last = bad.len() - 1;
    bad[last] ^= 0xff;
    f.write_binary(&[file_description(1, "a", 1), bad, frame(b"PAR 2.0\0Future\0\0", &[0; 8])].concat()).unwrap();

    parchive()
        .args(["packets", f.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"file-description\s+\d+\s+OK").unwrap())
        .stdout(predicate::str::is_match(r"recovery-slice\s+\d+\s+BAD").unwrap())
        .stdout(predicate::str::contains("unknown"))
        .stderr(predicate::str::contains("3 packet(s), 1 failed verification"));
}

#[test]
fn slices_and_extract() {
    let td = assert_fs::TempDir::new().unwrap();
    let f = td.child("set.vol4+2.par2");
    let mut bad = recovery_slice(5, &[5; 48]);
    bad[80] ^= 1;
    f.write_binary(&[recovery_slice(4, &[4; 48]), bad, recovery_slice(9, &[9; 48])].concat()).unwrap();
    let path = f.path().to_str().unwrap();

    parchive()
        .args(["slices", path])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"4\s+48\s+in-range\s+OK").unwrap())
        .stdout(predicate::str::is_match(r"5\s+48\s+in-range\s+BAD").unwrap())
        .stdout(predicate::str::is_match(r"9\s+48\s+out-of-range\s+OK").unwrap());

    let out = td.child("slice4.bin");
    parchive().args(["extract-slice", path, "4", out.path().to_str().unwrap()]).assert().success();
    assert_eq!(std::fs::read(out.path()).unwrap(), vec![4u8; 48]);

    parchive()
        .args(["extract-slice", path, "5", td.child("slice5.bin").path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("integrity"));
    td.child("slice5.bin").assert(predicate::path::missing());

    parchive()
        .args(["extract-slice", path, "6", td.child("slice6.bin").path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no recovery slice with exponent 6"));
}

#[test]
fn scan_groups_volumes_by_set() {
    let td = assert_fs::TempDir::new().unwrap();
    for name in ["alpha.par2", "alpha.vol0+1.par2", "alpha.vol1+2.PAR2", "sub/beta.vol00+10.par2", "notes.txt"] {
        td.child(name).write_binary(b"").unwrap();
    }
    parchive()
        .args(["scan", td.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha: 3 file(s), 3 recovery slice(s) by name"))
        .stdout(predicate::str::contains("beta: 1 file(s), 10 recovery slice(s) by name"))
        .stdout(predicate::str::contains("notes").not());
}

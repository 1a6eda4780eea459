use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use parchive_core::{ExponentRange, PacketReader, RecoveryFile, SourceFile};

#[derive(Parser)]
#[command(name="parchive", version, about="Inspect and verify PAR2 recovery files")]
struct Cli { #[command(subcommand)] cmd: Cmd }

#[derive(Subcommand)]
enum Cmd {
    /// Show what each file's name says about it (set name, exponent range)
    Info { #[arg(required=true)] refs: Vec<String>, #[arg(long)] json: bool },
    /// List the distinct source files described in a PAR2 file
    Files { reference: String, #[arg(long)] json: bool },
    /// Dump every packet with its verification status
    Packets { reference: String },
    /// List recovery slices and check their data
    Slices { reference: String },
    /// Write the verified recovery data of one slice to a file
    ExtractSlice { reference: String, exponent: u32, out: PathBuf },
    /// Group the PAR2 volumes under a directory by recovery set
    Scan { dir: PathBuf },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Info { refs, json } => info(&refs, json)?,
        Cmd::Files { reference, json } => files(&reference, json)?,
        Cmd::Packets { reference } => packets(&reference)?,
        Cmd::Slices { reference } => slices(&reference)?,
        Cmd::ExtractSlice { reference, exponent, out } => extract_slice(&reference, exponent, &out)?,
        Cmd::Scan { dir } => scan(&dir)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct InfoReport { reference: String, location: String, name: String, exponents: Option<ExponentRange>, index: bool }

fn range_str(r: Option<ExponentRange>) -> String {
    match r { Some(r) => format!("{}..={}", r.min, r.max), None => "index".to_string() }
}

fn info(refs: &[String], json: bool) -> Result<()> {
    let reports: Vec<InfoReport> = refs.iter().map(|r| {
        let rf = RecoveryFile::from_reference(r);
        InfoReport { reference: r.clone(), location: rf.location.to_string(), index: rf.is_index(), name: rf.name, exponents: rf.exponents }
    }).collect();
    if json { println!("{}", serde_json::to_string_pretty(&reports)?); return Ok(()); }
    for r in &reports {
        println!("{}: set={} exponents={} location={}", r.reference, r.name, range_str(r.exponents), r.location);
    }
    Ok(())
}

fn files(reference: &str, json: bool) -> Result<()> {
    let rf = RecoveryFile::from_reference(reference);
    let list: Vec<SourceFile> = rf.source_files().with_context(|| format!("open {}", rf.location))?.collect();
    if json { println!("{}", serde_json::to_string_pretty(&list)?); return Ok(()); }
    for f in &list { println!("{}  {:>12}  {}", f.file_id, f.size, f.name); }
    eprintln!("{} source file(s)", list.len());
    Ok(())
}

fn packets(reference: &str) -> Result<()> {
    let rf = RecoveryFile::from_reference(reference);
    let stream = rf.content_stream().with_context(|| format!("open {}", rf.location))?;
    let mut reader = PacketReader::new(stream)?;
    let (mut total, mut bad) = (0usize, 0usize);
    loop {
        let header = match reader.next_header() {
            Ok(Some(h)) => h,
            Ok(None) => break,
            Err(e) => return Err(e).with_context(|| format!("{}: framing lost after {} packet(s)", rf.location, total)),
        };
        let kind = match reader.registry().resolve(&header.type_id) {
            Some(d) => d.kind.to_string(),
            None => "unknown".to_string(),
        };
        let ok = reader.verify(&header)?;
        if !ok { bad += 1; }
        println!("{:>12}  {:<16} {:>10}  {}", header.offset, kind, header.length, if ok { "OK" } else { "BAD" });
        reader.skip(&header);
        total += 1;
    }
    eprintln!("{} packet(s), {} failed verification", total, bad);
    Ok(())
}

fn slices(reference: &str) -> Result<()> {
    let rf = RecoveryFile::from_reference(reference);
    let mut it = rf.recovery_slices().with_context(|| format!("open {}", rf.location))?;
    let found: Vec<_> = it.by_ref().collect();
    let declared = it.declared();
    let mut bad = 0usize;
    for s in &found {
        let in_range = declared.map_or(true, |r| r.contains(s.exponent));
        let status = match it.recovery_data(s) {
            Ok(_) => "OK".to_string(),
            Err(e) if e.is_integrity() => { bad += 1; "BAD".to_string() }
            Err(e) => return Err(e).with_context(|| format!("slice {} at offset {}", s.exponent, s.header.offset)),
        };
        println!("{:>6}  {:>10}  {:<12} {}", s.exponent, s.recovery_data_len(), if in_range { "in-range" } else { "out-of-range" }, status);
    }
    eprintln!("{} slice(s), declared {}, {} failed verification", found.len(), range_str(declared), bad);
    Ok(())
}

fn extract_slice(reference: &str, exponent: u32, out: &Path) -> Result<()> {
    let rf = RecoveryFile::from_reference(reference);
    let mut it = rf.recovery_slices().with_context(|| format!("open {}", rf.location))?;
    let Some(slice) = it.by_ref().find(|s| s.exponent == exponent) else {
        bail!("no recovery slice with exponent {} in {}", exponent, rf.location);
    };
    let data = it.recovery_data(&slice).with_context(|| format!("slice {} of {}", exponent, rf.location))?;
    fs::write(out, &data).with_context(|| format!("write {}", out.display()))?;
    eprintln!("Wrote {} bytes to {}", data.len(), out.display());
    Ok(())
}

fn scan(dir: &Path) -> Result<()> {
    if !dir.is_dir() { bail!("{} is not a directory", dir.display()); }
    let mut sets: BTreeMap<String, Vec<(String, Option<ExponentRange>)>> = BTreeMap::new();
    for e in WalkDir::new(dir).sort_by_file_name() {
        let e = match e { Ok(e) => e, Err(err) => { warn!(error = %err, "skipping unreadable entry"); continue; } };
        if !e.file_type().is_file() { continue; }
        let is_par2 = e.path().extension().is_some_and(|x| x.eq_ignore_ascii_case("par2"));
        if !is_par2 { continue; }
        let rf = RecoveryFile::from_path(e.path());
        debug!(path = %e.path().display(), set = %rf.name, "found volume");
        let shown = e.path().strip_prefix(dir).unwrap_or(e.path()).display().to_string();
        sets.entry(rf.name).or_default().push((shown, rf.exponents));
    }
    if sets.is_empty() { println!("No PAR2 files under {}", dir.display()); return Ok(()); }
    for (name, vols) in &sets {
        let slices: u64 = vols.iter().filter_map(|(_, r)| r.map(|r| r.count())).sum();
        println!("{}: {} file(s), {} recovery slice(s) by name", name, vols.len(), slices);
        for (path, r) in vols { println!("  {:<40} {}", path, range_str(*r)); }
    }
    Ok(())
}

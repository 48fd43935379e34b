//! uasset CLI - inspect and round-trip Unreal asset bundles.

use std::env;
use std::path::Path;
use std::process::ExitCode;

use uasset::prelude::*;
use uasset::uexp::AssetPayload;

use std::sync::atomic::{AtomicU8, Ordering};

/// Verbosity level (thread-safe)
const LOG_QUIET: u8 = 0;
const LOG_INFO: u8 = 1;
const LOG_DEBUG: u8 = 2;

static LOG_LEVEL: AtomicU8 = AtomicU8::new(LOG_INFO);

#[inline]
fn log_level() -> u8 {
    LOG_LEVEL.load(Ordering::Relaxed)
}

macro_rules! info {
    ($($arg:tt)*) => {
        if log_level() >= LOG_INFO {
            println!("{}", format!($($arg)*));
        }
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        if log_level() >= LOG_DEBUG {
            println!("[DEBUG] {}", format!($($arg)*));
        }
    };
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    let mut version = "4.18".to_string();
    let mut filtered: Vec<&str> = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => LOG_LEVEL.store(LOG_DEBUG, Ordering::Relaxed),
            "-q" | "--quiet" => LOG_LEVEL.store(LOG_QUIET, Ordering::Relaxed),
            "--version" => {
                version = match iter.next() {
                    Some(v) => v.clone(),
                    None => {
                        eprintln!("--version needs a value (e.g. 4.18, 4.27, 5.0, ff7r)");
                        return ExitCode::FAILURE;
                    }
                }
            }
            other => filtered.push(other),
        }
    }

    if filtered.len() < 2 {
        print_help();
        return ExitCode::FAILURE;
    }

    let result = match filtered[0] {
        "info" | "i" => cmd_info(filtered[1], &version),
        "roundtrip" | "rt" => cmd_roundtrip(filtered[1], &version),
        other => {
            eprintln!("unknown command: {other}");
            print_help();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("uasset-cli - inspect and round-trip Unreal asset bundles");
    println!();
    println!("Usage:");
    println!("  uasset-cli info <file> [--version <v>]       show bundle structure");
    println!("  uasset-cli roundtrip <file> [--version <v>]  load, re-save, compare bytes");
    println!();
    println!("Flags:");
    println!("  --version <v>   engine version tag (4.13 .. 5.0, ff7r, kh3); default 4.18");
    println!("  -v, --verbose   more output");
    println!("  -q, --quiet     errors only");
}

fn cmd_info(file: &str, version: &str) -> Result<()> {
    let mut asset = Uasset::open(file, version)?;
    if log_level() >= LOG_DEBUG {
        // best effort; missing material files only log warnings
        asset.load_material_assets()?;
    }

    info!("{} ({})", asset.asset_name, asset.asset_type);
    info!("  engine version: {}", asset.version);
    info!("  asset path: {}", asset.asset_path);
    info!("  container size: {}", asset.size);
    info!("  names: {}", asset.names.len());
    info!("  imports: {}", asset.imports.len());
    info!("  exports: {}", asset.exports.len());

    for (i, imp) in asset.imports.iter().enumerate() {
        debug!("import {i}: {} ({}) in {}", imp.name_str, imp.class_str, imp.parent_name);
    }
    for exp in &asset.exports {
        debug!(
            "export {}: class {} size {} offset {}",
            exp.name_str, exp.class_str, exp.size, exp.offset
        );
    }

    if let Some(uexp) = &asset.payload {
        if !uexp.author().is_empty() {
            info!("  author: {}", uexp.author());
        }
        match &uexp.payload {
            AssetPayload::SkeletalMesh(mesh) => {
                info!("  skeletal mesh: {} materials, {} bones, {} LODs",
                    mesh.materials.len(), mesh.skeleton.bones().len(), mesh.lods.len());
                for (i, mat) in mesh.materials.iter().enumerate() {
                    info!("    slot {i}: {} ({})", mat.slot_name, mat.asset_name);
                    for path in &mat.texture_asset_paths {
                        debug!("      texture: {path}");
                    }
                }
            }
            AssetPayload::StaticMesh(mesh) => {
                info!("  static mesh: {} materials, {} LODs", mesh.materials.len(), mesh.lods.len());
            }
            AssetPayload::Skeleton(skeleton) => {
                info!("  skeleton: {} bones", skeleton.array.bones.len());
                for bone in &skeleton.array.bones {
                    debug!("    {} (parent: {})", bone.name, bone.parent_name);
                }
            }
            AssetPayload::Texture(texture) => {
                let (uexp_mips, ubulk_mips) = texture.mipmap_counts();
                let (width, height) = texture.max_size();
                info!("  texture: {} {}x{}, {} payload mips, {} overflow mips",
                    texture.format, width, height, uexp_mips, ubulk_mips);
            }
            AssetPayload::Anim(anim) => {
                info!("  animation: {} frames, {} bone tracks", anim.frame_count, anim.bone_ids.len());
            }
            AssetPayload::Opaque => {
                info!("  payload kept verbatim for this class");
            }
        }
    }
    Ok(())
}

fn cmd_roundtrip(file: &str, version: &str) -> Result<()> {
    let dir = tempdir()?;
    let out = dir.join(
        Path::new(file)
            .file_name()
            .ok_or_else(|| Error::other("bad input path"))?,
    );

    let mut asset = Uasset::open(file, version)?;
    asset.save(&out)?;

    let mut same = true;
    for (a, b) in [
        (Path::new(file).with_extension("uasset"), out.with_extension("uasset")),
        (Path::new(file).with_extension("uexp"), out.with_extension("uexp")),
        (Path::new(file).with_extension("ubulk"), out.with_extension("ubulk")),
    ] {
        if !a.exists() && !b.exists() {
            continue;
        }
        let left = std::fs::read(&a)?;
        let right = std::fs::read(&b)?;
        match first_difference(&left, &right) {
            None => info!("{}: identical ({} bytes)", a.display(), left.len()),
            Some(at) => {
                same = false;
                info!("{}: differs at byte {at}", a.display());
            }
        }
    }
    let _ = std::fs::remove_dir_all(&dir);
    if same {
        Ok(())
    } else {
        Err(Error::other("round trip produced different bytes"))
    }
}

fn first_difference(a: &[u8], b: &[u8]) -> Option<usize> {
    if a.len() != b.len() {
        return Some(a.len().min(b.len()));
    }
    a.iter().zip(b).position(|(x, y)| x != y)
}

fn tempdir() -> Result<std::path::PathBuf> {
    let dir = env::temp_dir().join(format!("uasset-rt-{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

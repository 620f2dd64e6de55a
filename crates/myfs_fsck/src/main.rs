use clap::Parser;
use colored::*; // Para output bonito
use std::path::PathBuf;

use myfs_lib::device::open_image;
use myfs_lib::types::Geometry;
use myfs_lib::{FileSystem, FsError};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Archivo de imagen a revisar
    #[arg(value_name = "IMAGE", default_value = "disk.img")]
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    println!("{}", "=== MYFS File System Check (fsck) ===".bold().blue());

    // 1. Validar acceso a la imagen
    if !args.path.exists() {
        anyhow::bail!("La imagen no existe: {:?}", args.path);
    }
    let file = open_image(&args.path)?;
    println!("[*] Imagen encontrada en {:?}", args.path);

    // 2. Superbloque: firma y geometría
    println!("[*] Leyendo Superbloque...");
    let mut fs = match FileSystem::open(file, Geometry::DEFAULT) {
        Ok(fs) => fs,
        Err(FsError::InvalidImage(reason)) => {
            println!("{} {}", "[FAIL] No es una imagen MYFS válida:".red(), reason);
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };
    println!("{}", "[OK] Firma MYFS válida (Magic Number correcto)".green());

    let usage = fs.usage()?;
    println!("    > Total Blocks: {} ({} libres)", usage.total_blocks, usage.free_blocks);
    println!("    > Inodes: {} ({} libres)", usage.total_inodes, usage.free_inodes);

    // 3. Recalcular el uso real a partir de los inodos y comparar
    println!("[*] Analizando bitmaps y tabla de inodos...");
    let report = fs.check()?;
    println!("    > Inodos activos encontrados: {}", report.live_inodes);
    println!("    > Bloques referenciados: {}", report.used_blocks);

    println!("[*] Buscando inconsistencias...");
    for issue in &report.issues {
        if issue.is_corruption() {
            println!("    {} {}", "[CORRUPCIÓN]".red(), issue);
        } else {
            println!("    {} {}", "[WARN]".yellow(), issue);
        }
    }

    let errors = report.corruption_count();
    if report.is_clean() {
        println!("\n{}", ">> EL SISTEMA DE ARCHIVOS ESTÁ SANO".bold().green());
    } else if errors == 0 {
        println!(
            "\n{} {} avisos, sin errores graves.",
            ">> ATENCIÓN:".bold().yellow(),
            report.issues.len()
        );
    } else {
        println!("\n{} Se encontraron {} errores graves.", ">> PRECAUCIÓN:".bold().red(), errors);
        std::process::exit(1);
    }

    Ok(())
}

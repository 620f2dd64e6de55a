use chrono::{Local, TimeZone};
use clap::{Parser, Subcommand};
use colored::*;
use log::debug;
use std::io::Read;
use std::path::PathBuf;

use myfs_lib::{FileEntry, FileSystem};

/// Ejecuta una sola operación sobre una imagen MYFS
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Archivo de imagen
    #[arg(short, long, value_name = "IMAGE", default_value = "disk.img")]
    image: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crea un archivo vacío
    Create { name: String },
    /// Elimina un archivo y libera sus bloques
    Rm { name: String },
    /// Lista todos los archivos
    Ls,
    /// Reemplaza el contenido (sin DATA se lee de stdin)
    Write { name: String, data: Option<String> },
    /// Agrega al final, separado por un salto de línea
    Append { name: String, data: Option<String> },
    /// Muestra el contenido
    Cat {
        name: String,
        /// Tamaño del buffer de lectura (incluye el terminador)
        #[arg(short, long, default_value_t = 1024)]
        capacity: usize,
    },
    /// Metadatos de un archivo
    Stat { name: String },
    /// Espacio libre
    Df,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if !args.image.exists() {
        anyhow::bail!("La imagen no existe: {:?} (use myfs_mkfs primero)", args.image);
    }
    let mut fs = FileSystem::open_path(&args.image)?;
    debug!("Imagen {:?} abierta", args.image);

    match args.command {
        Command::Create { name } => {
            let index = fs.create(&name)?;
            println!("{} Archivo '{}' creado (inodo {})", "[OK]".green(), name, index);
        }
        Command::Rm { name } => {
            fs.delete(&name)?;
            println!("{} Archivo '{}' eliminado", "[OK]".green(), name);
        }
        Command::Ls => print_listing(&fs.list()?),
        Command::Write { name, data } => {
            let data = input_data(data)?;
            fs.overwrite(&name, &data)?;
            println!("{} {} bytes escritos en '{}'", "[OK]".green(), data.len(), name);
        }
        Command::Append { name, data } => {
            let data = input_data(data)?;
            fs.append(&name, &data)?;
            println!("{} {} bytes agregados a '{}'", "[OK]".green(), data.len(), name);
        }
        Command::Cat { name, capacity } => {
            let content = fs.read(&name, capacity)?;
            println!("{}", String::from_utf8_lossy(&content));
        }
        Command::Stat { name } => {
            let entry = fs.stat(&name)?;
            println!("Inodo:   {}", entry.index);
            println!("Nombre:  {}", entry.name);
            println!("Tamaño:  {} bytes", entry.size);
            println!("Bloques: {}", entry.block_count);
            println!("Mtime:   {}", format_mtime(entry.mtime));
        }
        Command::Df => {
            let usage = fs.usage()?;
            println!("Bloques: {} de {} libres ({} bytes c/u)", usage.free_blocks, usage.total_blocks, usage.block_size);
            println!("Inodos:  {} de {} libres", usage.free_inodes, usage.total_inodes);
        }
    }

    fs.close()?;
    Ok(())
}

/// Datos del argumento o, si no hay, todo stdin hasta EOF.
fn input_data(arg: Option<String>) -> anyhow::Result<Vec<u8>> {
    match arg {
        Some(text) => Ok(text.into_bytes()),
        None => {
            let mut buf = Vec::new();
            std::io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn print_listing(entries: &[FileEntry]) {
    println!(
        "{}",
        format!("{:<6} {:<15} {:<6} {:<8} {:<16} {:<6}", "INODE", "NAME", "TYPE", "SIZE", "MTIME", "BLOCKS").bold()
    );
    for entry in entries {
        println!(
            "{:<6} {:<15} {:<6} {:<8} {:<16} {:<6}",
            entry.index,
            short_name(&entry.name),
            file_kind(&entry.name),
            entry.size,
            format_mtime(entry.mtime),
            entry.block_count
        );
    }
    println!("{} archivo(s)", entries.len());
}

/// Recorta a 15 caracteres para que la tabla no se desarme.
fn short_name(name: &str) -> String {
    name.chars().take(15).collect()
}

fn file_kind(name: &str) -> &'static str {
    if name.contains(".txt") {
        "text"
    } else if name.contains(".dat") {
        "data"
    } else {
        "file"
    }
}

fn format_mtime(mtime: i64) -> String {
    if mtime <= 0 {
        return "unknown".to_string();
    }
    match Local.timestamp_opt(mtime, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => "unknown".to_string(),
    }
}

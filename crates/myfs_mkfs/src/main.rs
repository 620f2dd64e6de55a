use clap::Parser;
use log::info;
use myfs_lib::FileSystem;
use myfs_lib::types::{DIRECT_BLOCKS, Geometry};
use std::path::PathBuf;

/// Herramienta para formatear una imagen MYFS
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Ruta al archivo de imagen
    #[arg(value_name = "IMAGE", default_value = "disk.img")]
    path: PathBuf,

    /// Sobrescribe la imagen aunque ya exista
    #[arg(short, long)]
    force: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init(); // Para ver logs con RUST_LOG=debug
    let args = Args::parse();
    println!("=== Formateador MYFS ===");
    println!("Imagen objetivo: {:?}", args.path);

    if args.path.exists() && !args.force {
        anyhow::bail!("La imagen ya existe. Use --force para formatearla de nuevo.");
    }

    let geometry = Geometry::DEFAULT;
    let layout = geometry.layout();
    println!(
        "Iniciando formateo: {} inodos, {} bloques de {} bytes...",
        geometry.inode_count, geometry.block_count, geometry.block_size
    );

    FileSystem::format_path(&args.path)?;
    info!("Imagen escrita en {:?}", args.path);

    println!("[x] Superbloque en offset 0");
    println!("[x] Bitmap de inodos en offset {}", layout.inode_bitmap);
    println!("[x] Bitmap de bloques en offset {}", layout.block_bitmap);
    println!("[x] Tabla de inodos en offset {}", layout.inode_table);
    println!("[x] Área de datos en offset {} ({} bytes en total)", layout.data_start, layout.image_size);
    println!(
        "Tamaño máximo por archivo: {} bytes ({} bloques directos)",
        geometry.max_file_size(),
        DIRECT_BLOCKS
    );

    // Verificación: la imagen recién escrita tiene que abrir sin problemas
    let mut fs = FileSystem::open_path(&args.path)?;
    let usage = fs.usage()?;
    println!(
        "Libres: {} inodos, {} bloques",
        usage.free_inodes, usage.free_blocks
    );

    println!("¡Formateo completado exitosamente!");
    Ok(())
}

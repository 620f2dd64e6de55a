use log::{debug, info};

use crate::bitmap::Bitmap;
use crate::device::BackingStore;
use crate::error::{FsError, Result};
use crate::types::{Geometry, INODE_SIZE, MYFS_MAGIC, RESERVED_INDEX, SUPERBLOCK_SIZE, SuperBlock};

/// Escribe una imagen nueva: superbloque, bitmaps, tabla de inodos y datos en cero.
///
/// No es atómico: si una escritura falla, la imagen queda a medias.
pub fn initialize_image<S: BackingStore>(store: &mut S, geometry: Geometry) -> Result<SuperBlock> {
    if !geometry.is_valid() {
        return Err(FsError::InvalidImage(format!("geometría inválida: {:?}", geometry)));
    }
    let sb = SuperBlock::new(geometry);
    let block_size = geometry.block_size as usize;

    // PASO 1: Superbloque, relleno hasta ocupar el bloque 0 completo
    let mut block0 = bincode::serialize(&sb)?;
    block0.resize(block_size, 0);
    store.write_at(0, &block0)?;
    debug!("Superbloque escrito en offset 0");

    // PASO 2: Bitmaps, con el índice reservado ya ocupado
    let mut inode_map = Bitmap::new(geometry.inode_count as usize);
    inode_map.set(RESERVED_INDEX as usize);
    inode_map.store(store, sb.inode_bitmap)?;

    let mut block_map = Bitmap::new(geometry.block_count as usize);
    block_map.set(RESERVED_INDEX as usize);
    block_map.store(store, sb.block_bitmap)?;
    debug!("Bitmaps escritos en {} y {}", sb.inode_bitmap, sb.block_bitmap);

    // PASO 3: Tabla de inodos (todas las ranuras en cero = libres)
    let table = vec![0u8; geometry.inode_count as usize * INODE_SIZE];
    store.write_at(sb.inode_table, &table)?;

    // PASO 4: Área de datos, bloque por bloque
    let zero_block = vec![0u8; block_size];
    for block in 0..geometry.block_count {
        store.write_at(sb.block_offset(block), &zero_block)?;
    }

    store.flush()?;
    info!(
        "Imagen formateada: {} inodos, {} bloques de {} bytes",
        sb.inode_count, sb.block_count, sb.block_size
    );
    Ok(sb)
}

/// Lee el superbloque y verifica que la imagen fue formateada con la misma geometría.
pub fn open_image<S: BackingStore>(store: &mut S, expected: Geometry) -> Result<SuperBlock> {
    let sb = read_superblock(store)?;

    if sb.magic != MYFS_MAGIC {
        return Err(FsError::InvalidImage(format!(
            "firma 0x{:08X}, se esperaba 0x{:08X}",
            sb.magic, MYFS_MAGIC
        )));
    }
    if sb.block_size != expected.block_size {
        return Err(FsError::InvalidImage(format!(
            "tamaño de bloque incompatible ({} != {})",
            sb.block_size, expected.block_size
        )));
    }
    if sb.geometry() != expected {
        return Err(FsError::InvalidImage(format!(
            "geometría incompatible ({:?} != {:?})",
            sb.geometry(),
            expected
        )));
    }
    Ok(sb)
}

pub fn read_superblock<S: BackingStore>(store: &mut S) -> Result<SuperBlock> {
    let mut bytes = [0u8; SUPERBLOCK_SIZE];
    store.read_at(0, &mut bytes).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => {
            FsError::InvalidImage("la imagen es más chica que el superbloque".to_string())
        }
        _ => FsError::Io(e),
    })?;
    Ok(bincode::deserialize(&bytes)?)
}

/// Reescribe el superbloque en memoria en su offset fijo.
pub fn persist<S: BackingStore>(store: &mut S, sb: &SuperBlock) -> Result<()> {
    let bytes = bincode::serialize(sb)?;
    store.write_at(0, &bytes)?;
    debug!(
        "Superbloque actualizado: {} inodos libres, {} bloques libres",
        sb.free_inodes, sb.free_blocks
    );
    Ok(())
}

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

// --- CONSTANTES DE DISEÑO ---
pub const BLOCK_SIZE: usize = 4096;
pub const INODE_COUNT: usize = 1024;
pub const BLOCK_COUNT: usize = 4096;
pub const MYFS_MAGIC: u32 = 0x4D594653; // "MYFS"
pub const MAX_FILENAME_LEN: usize = 255;

/// Punteros directos por inodo. No hay bloques indirectos.
pub const DIRECT_BLOCKS: usize = 12;

/// Tamaño fijo de cada ranura de la tabla de inodos en disco.
pub const INODE_SIZE: usize = 512;

/// Bytes que se leen del offset 0 para decodificar el superbloque.
pub const SUPERBLOCK_SIZE: usize = 64;

/// Índice 0 reservado en ambos bitmaps: en las listas de bloques significa "ranura vacía".
pub const RESERVED_INDEX: u32 = 0;

// --- GEOMETRÍA ---

/// Constantes de formato que deben coincidir entre quien formatea y quien abre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub block_size: u32,
    pub inode_count: u32,
    pub block_count: u32,
}

impl Geometry {
    pub const DEFAULT: Geometry = Geometry {
        block_size: BLOCK_SIZE as u32,
        inode_count: INODE_COUNT as u32,
        block_count: BLOCK_COUNT as u32,
    };

    /// Calcula los offsets de cada estructura. Todo empieza alineado a bloque.
    pub fn layout(&self) -> Layout {
        let bs = self.block_size as u64;
        let align = |n: u64| n.div_ceil(bs) * bs;

        // El superbloque ocupa el bloque 0 de la imagen
        let inode_bitmap = bs;
        let block_bitmap = inode_bitmap + align(bitmap_bytes(self.inode_count) as u64);
        let inode_table = block_bitmap + align(bitmap_bytes(self.block_count) as u64);
        let data_start = inode_table + align(self.inode_count as u64 * INODE_SIZE as u64);

        Layout {
            inode_bitmap,
            block_bitmap,
            inode_table,
            data_start,
            image_size: data_start + self.block_count as u64 * bs,
        }
    }

    /// Geometrías demasiado pequeñas no dejan ni un inodo ni un bloque útil.
    pub fn is_valid(&self) -> bool {
        self.block_size as usize >= SUPERBLOCK_SIZE && self.inode_count >= 2 && self.block_count >= 2
    }

    pub fn max_file_size(&self) -> u64 {
        DIRECT_BLOCKS as u64 * self.block_size as u64
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Offsets absolutos (en bytes) desde el inicio de la imagen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub inode_bitmap: u64,
    pub block_bitmap: u64,
    pub inode_table: u64,
    pub data_start: u64,
    pub image_size: u64,
}

/// Un bit por elemento, redondeado a bytes completos.
pub fn bitmap_bytes(bits: u32) -> usize {
    (bits as usize).div_ceil(8)
}

// --- ESTRUCTURAS EN DISCO ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SuperBlock {
    pub magic: u32,
    pub block_size: u32,
    pub inode_count: u32,
    pub block_count: u32,

    // Siempre iguales a la cantidad de bits en 0 de cada bitmap
    pub free_inodes: u32,
    pub free_blocks: u32,

    pub inode_bitmap: u64,
    pub block_bitmap: u64,
    pub inode_table: u64,
    pub data_start: u64,
}

impl SuperBlock {
    /// Superbloque recién formateado: todo libre salvo el índice reservado.
    pub fn new(geometry: Geometry) -> Self {
        let layout = geometry.layout();
        Self {
            magic: MYFS_MAGIC,
            block_size: geometry.block_size,
            inode_count: geometry.inode_count,
            block_count: geometry.block_count,
            free_inodes: geometry.inode_count - 1,
            free_blocks: geometry.block_count - 1,
            inode_bitmap: layout.inode_bitmap,
            block_bitmap: layout.block_bitmap,
            inode_table: layout.inode_table,
            data_start: layout.data_start,
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            block_size: self.block_size,
            inode_count: self.inode_count,
            block_count: self.block_count,
        }
    }

    pub fn inode_offset(&self, index: u32) -> u64 {
        self.inode_table + index as u64 * INODE_SIZE as u64
    }

    pub fn block_offset(&self, block: u32) -> u64 {
        self.data_start + block as u64 * self.block_size as u64
    }
}

/// Registro de un archivo. Una ranura con todo en cero equivale a un inodo libre.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Inode {
    pub mode: u16,
    pub uid: u16,
    pub size: u64,
    pub mtime: i64, // segundos desde la época Unix (UTC)
    pub blocks: [u32; DIRECT_BLOCKS],
    pub name: String,
}

impl Inode {
    pub fn new(name: &str) -> Self {
        Self {
            mode: 0o644,
            uid: 0,
            size: 0,
            mtime: Utc::now().timestamp(),
            blocks: [RESERVED_INDEX; DIRECT_BLOCKS],
            name: name.to_string(),
        }
    }

    /// Ranuras ocupadas (distintas del centinela).
    pub fn block_count(&self) -> usize {
        self.blocks.iter().filter(|&&b| b != RESERVED_INDEX).count()
    }

    /// Bloques contiguos desde la ranura 0 hasta el primer centinela.
    pub fn owned_blocks(&self) -> usize {
        self.blocks.iter().take_while(|&&b| b != RESERVED_INDEX).count()
    }

    pub fn touch(&mut self) {
        self.mtime = Utc::now().timestamp();
    }
}

// --- VISTAS PARA EL LLAMADOR ---

#[derive(Debug, Clone, PartialEq)]
pub struct FileEntry {
    pub index: u32,
    pub name: String,
    pub size: u64,
    pub mtime: i64,
    pub block_count: usize,
}

impl FileEntry {
    pub fn from_inode(index: u32, inode: &Inode) -> Self {
        Self {
            index,
            name: inode.name.clone(),
            size: inode.size,
            mtime: inode.mtime,
            block_count: inode.block_count(),
        }
    }

    /// `None` si el timestamp guardado no es representable.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.mtime, 0).single()
    }
}

/// Equivalente a un statfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub block_size: u32,
    pub total_inodes: u32,
    pub free_inodes: u32,
    pub total_blocks: u32,
    pub free_blocks: u32,
}

impl From<&SuperBlock> for Usage {
    fn from(sb: &SuperBlock) -> Self {
        Self {
            block_size: sb.block_size,
            total_inodes: sb.inode_count,
            free_inodes: sb.free_inodes,
            total_blocks: sb.block_count,
            free_blocks: sb.free_blocks,
        }
    }
}

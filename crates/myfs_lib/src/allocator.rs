use log::{debug, warn};

use crate::bitmap::Bitmap;
use crate::device::BackingStore;
use crate::error::{FsError, Result};
use crate::superblock;
use crate::types::{RESERVED_INDEX, SuperBlock};

/// Superbloque + ambos bitmaps cargados para una sola operación.
///
/// Cada asignación o liberación toca el bit y el contador del superbloque
/// juntos, así `free_* == bits en 0` se mantiene mientras viva el valor.
#[derive(Debug, Clone)]
pub struct Allocator {
    pub sb: SuperBlock,
    pub inode_map: Bitmap,
    pub block_map: Bitmap,
}

impl Allocator {
    pub fn load<S: BackingStore>(store: &mut S, sb: SuperBlock) -> Result<Self> {
        let inode_map = Bitmap::load(store, sb.inode_bitmap, sb.inode_count as usize)?;
        let block_map = Bitmap::load(store, sb.block_bitmap, sb.block_count as usize)?;
        Ok(Self { sb, inode_map, block_map })
    }

    pub fn allocate_inode(&mut self) -> Result<u32> {
        if self.sb.free_inodes == 0 {
            return Err(FsError::NoFreeInodes);
        }
        let index = self.inode_map.first_clear().ok_or(FsError::NoFreeInodes)?;
        self.inode_map.set(index);
        self.sb.free_inodes -= 1;
        debug!("Inodo {} asignado", index);
        Ok(index as u32)
    }

    pub fn release_inode(&mut self, index: u32) {
        if index == RESERVED_INDEX || !self.inode_map.get(index as usize) {
            warn!("Se ignoró la liberación del inodo {}", index);
            return;
        }
        self.inode_map.clear(index as usize);
        self.sb.free_inodes += 1;
        debug!("Inodo {} liberado", index);
    }

    pub fn allocate_block(&mut self) -> Result<u32> {
        if self.sb.free_blocks == 0 {
            return Err(FsError::NoFreeBlocks);
        }
        let block = self.block_map.first_clear().ok_or(FsError::NoFreeBlocks)?;
        self.block_map.set(block);
        self.sb.free_blocks -= 1;
        debug!("Bloque {} asignado", block);
        Ok(block as u32)
    }

    /// Asigna `count` bloques o ninguno: si falta espacio devuelve los que ya tomó.
    pub fn allocate_blocks(&mut self, count: usize) -> Result<Vec<u32>> {
        let mut fresh = Vec::with_capacity(count);
        for _ in 0..count {
            match self.allocate_block() {
                Ok(block) => fresh.push(block),
                Err(e) => {
                    for &block in &fresh {
                        self.release_block(block);
                    }
                    debug!("Asignación revertida: {} bloques devueltos", fresh.len());
                    return Err(e);
                }
            }
        }
        Ok(fresh)
    }

    pub fn release_block(&mut self, block: u32) {
        if block == RESERVED_INDEX || !self.block_map.get(block as usize) {
            warn!("Se ignoró la liberación del bloque {}", block);
            return;
        }
        self.block_map.clear(block as usize);
        self.sb.free_blocks += 1;
        debug!("Bloque {} liberado", block);
    }

    pub fn is_inode_live(&self, index: u32) -> bool {
        index != RESERVED_INDEX && self.inode_map.get(index as usize)
    }

    /// Guarda los dos bitmaps (el superbloque va aparte, al final).
    pub fn store_bitmaps<S: BackingStore>(&self, store: &mut S) -> Result<()> {
        self.inode_map.store(store, self.sb.inode_bitmap)?;
        self.block_map.store(store, self.sb.block_bitmap)?;
        Ok(())
    }

    pub fn store_superblock<S: BackingStore>(&self, store: &mut S) -> Result<()> {
        superblock::persist(store, &self.sb)
    }
}

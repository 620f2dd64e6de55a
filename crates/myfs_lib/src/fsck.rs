use std::collections::HashMap;
use std::fmt;

use crate::allocator::Allocator;
use crate::device::BackingStore;
use crate::error::Result;
use crate::inode_table::read_inode;
use crate::types::{DIRECT_BLOCKS, RESERVED_INDEX};

/// Inconsistencia encontrada entre superbloque, bitmaps e inodos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    FreeInodeCounter { stored: u32, actual: u32 },
    FreeBlockCounter { stored: u32, actual: u32 },
    ReservedInodeClear,
    ReservedBlockClear,
    DuplicateName { name: String, first: u32, second: u32 },
    SizeTooLarge { inode: u32, size: u64 },
    BlockCountMismatch { inode: u32, size: u64, blocks: usize },
    BlockListGap { inode: u32 },
    BlockOutOfRange { inode: u32, block: u32 },
    BlockMarkedFree { inode: u32, block: u32 },
    DoubleOwnership { block: u32, first: u32, second: u32 },
    OrphanBlock { block: u32 },
}

impl Issue {
    /// Las graves pierden datos si se sigue escribiendo; el resto solo desperdicia espacio.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, Issue::OrphanBlock { .. } | Issue::FreeBlockCounter { .. } | Issue::FreeInodeCounter { .. })
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Issue::FreeInodeCounter { stored, actual } => {
                write!(f, "El superbloque dice {} inodos libres, el bitmap tiene {}", stored, actual)
            }
            Issue::FreeBlockCounter { stored, actual } => {
                write!(f, "El superbloque dice {} bloques libres, el bitmap tiene {}", stored, actual)
            }
            Issue::ReservedInodeClear => write!(f, "El inodo reservado 0 está marcado como LIBRE"),
            Issue::ReservedBlockClear => write!(f, "El bloque reservado 0 está marcado como LIBRE"),
            Issue::DuplicateName { name, first, second } => {
                write!(f, "El nombre '{}' aparece en los inodos {} y {}", name, first, second)
            }
            Issue::SizeTooLarge { inode, size } => {
                write!(f, "Inodo {} declara {} bytes, más de lo que caben en {} bloques", inode, size, DIRECT_BLOCKS)
            }
            Issue::BlockCountMismatch { inode, size, blocks } => {
                write!(f, "Inodo {} tiene {} bytes pero {} bloques", inode, size, blocks)
            }
            Issue::BlockListGap { inode } => write!(f, "Inodo {} tiene punteros después de una ranura vacía", inode),
            Issue::BlockOutOfRange { inode, block } => {
                write!(f, "Inodo {} apunta a bloque fuera de rango: {}", inode, block)
            }
            Issue::BlockMarkedFree { inode, block } => {
                write!(f, "Bloque {} está en uso por el inodo {} pero marcado como LIBRE", block, inode)
            }
            Issue::DoubleOwnership { block, first, second } => {
                write!(f, "Bloque {} pertenece a los inodos {} y {}", block, first, second)
            }
            Issue::OrphanBlock { block } => write!(f, "Bloque {} marcado como ocupado pero nadie lo usa (huérfano)", block),
        }
    }
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub live_inodes: usize,
    pub used_blocks: usize,
    pub issues: Vec<Issue>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn corruption_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_corruption()).count()
    }
}

/// Recalcula qué bloques están REALMENTE en uso y lo compara con lo guardado.
/// Solo lee; no repara nada.
pub fn check<S: BackingStore>(store: &mut S, alloc: &Allocator) -> Result<CheckReport> {
    let sb = &alloc.sb;
    let mut report = CheckReport::default();

    let actual_inodes = alloc.inode_map.count_clear() as u32;
    if actual_inodes != sb.free_inodes {
        report.issues.push(Issue::FreeInodeCounter { stored: sb.free_inodes, actual: actual_inodes });
    }
    let actual_blocks = alloc.block_map.count_clear() as u32;
    if actual_blocks != sb.free_blocks {
        report.issues.push(Issue::FreeBlockCounter { stored: sb.free_blocks, actual: actual_blocks });
    }
    if !alloc.inode_map.get(RESERVED_INDEX as usize) {
        report.issues.push(Issue::ReservedInodeClear);
    }
    if !alloc.block_map.get(RESERVED_INDEX as usize) {
        report.issues.push(Issue::ReservedBlockClear);
    }

    let block_size = sb.block_size as u64;
    let mut owners: HashMap<u32, u32> = HashMap::new();
    let mut names: HashMap<String, u32> = HashMap::new();

    for index in 1..sb.inode_count {
        if !alloc.inode_map.get(index as usize) {
            continue;
        }
        report.live_inodes += 1;
        let inode = read_inode(store, sb, index)?;

        if let Some(&first) = names.get(&inode.name) {
            report.issues.push(Issue::DuplicateName { name: inode.name.clone(), first, second: index });
        } else {
            names.insert(inode.name.clone(), index);
        }

        if inode.size > DIRECT_BLOCKS as u64 * block_size {
            report.issues.push(Issue::SizeTooLarge { inode: index, size: inode.size });
        }
        let expected = inode.size.div_ceil(block_size) as usize;
        if inode.block_count() != expected {
            report.issues.push(Issue::BlockCountMismatch {
                inode: index,
                size: inode.size,
                blocks: inode.block_count(),
            });
        }
        if inode.owned_blocks() != inode.block_count() {
            report.issues.push(Issue::BlockListGap { inode: index });
        }

        for &block in inode.blocks.iter().filter(|&&b| b != RESERVED_INDEX) {
            if block >= sb.block_count {
                report.issues.push(Issue::BlockOutOfRange { inode: index, block });
                continue;
            }
            if !alloc.block_map.get(block as usize) {
                report.issues.push(Issue::BlockMarkedFree { inode: index, block });
            }
            if let Some(&first) = owners.get(&block) {
                report.issues.push(Issue::DoubleOwnership { block, first, second: index });
            } else {
                owners.insert(block, index);
            }
        }
    }
    report.used_blocks = owners.len();

    // Falsos ocupados: el bitmap dice ocupado pero ningún inodo lo referencia
    for block in 1..sb.block_count {
        if alloc.block_map.get(block as usize) && !owners.contains_key(&block) {
            report.issues.push(Issue::OrphanBlock { block });
        }
    }

    Ok(report)
}

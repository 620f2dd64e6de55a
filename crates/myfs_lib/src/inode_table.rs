use crate::bitmap::Bitmap;
use crate::device::BackingStore;
use crate::error::{FsError, Result};
use crate::types::{INODE_SIZE, Inode, MAX_FILENAME_LEN, SuperBlock};

pub fn read_inode<S: BackingStore>(store: &mut S, sb: &SuperBlock, index: u32) -> Result<Inode> {
    let mut slot = vec![0u8; INODE_SIZE];
    store.read_at(sb.inode_offset(index), &mut slot)?;
    Ok(bincode::deserialize(&slot)?)
}

/// Escribe el inodo rellenando su ranura fija con ceros.
pub fn write_inode<S: BackingStore>(store: &mut S, sb: &SuperBlock, index: u32, inode: &Inode) -> Result<()> {
    let mut slot = bincode::serialize(inode)?;
    if slot.len() > INODE_SIZE {
        return Err(FsError::InvalidName(inode.name.clone()));
    }
    slot.resize(INODE_SIZE, 0);
    store.write_at(sb.inode_offset(index), &slot)?;
    Ok(())
}

/// Rechaza nombres que no caben en el campo del inodo.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(FsError::InvalidName("nombre vacío".to_string()));
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(FsError::InvalidName(format!(
            "{} bytes, máximo {}",
            name.len(),
            MAX_FILENAME_LEN
        )));
    }
    if name.contains('\0') {
        return Err(FsError::InvalidName(format!("{:?} contiene un byte nulo", name)));
    }
    Ok(())
}

/// Búsqueda lineal por nombre sobre los inodos ocupados (1..capacidad).
/// Devuelve el primer índice que coincide.
pub fn find_by_name<S: BackingStore>(
    store: &mut S,
    sb: &SuperBlock,
    inode_map: &Bitmap,
    name: &str,
) -> Result<Option<(u32, Inode)>> {
    for index in 1..sb.inode_count {
        if !inode_map.get(index as usize) {
            continue;
        }
        let inode = read_inode(store, sb, index)?;
        if inode.name == name {
            return Ok(Some((index, inode)));
        }
    }
    Ok(None)
}

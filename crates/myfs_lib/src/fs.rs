use std::fs::File;
use std::path::Path;

use log::{debug, info, warn};

use crate::allocator::Allocator;
use crate::device::{self, BackingStore};
use crate::error::{FsError, Result};
use crate::fsck::{self, CheckReport};
use crate::inode_table::{find_by_name, read_inode, validate_name, write_inode};
use crate::superblock;
use crate::types::{DIRECT_BLOCKS, FileEntry, Geometry, Inode, RESERVED_INDEX, SuperBlock, Usage};

/// Separador que `append` inserta antes de los datos nuevos si el archivo no está vacío.
const APPEND_SEPARATOR: &[u8] = b"\n";

/// Handle sobre una imagen abierta.
///
/// No guarda estado entre llamadas: cada operación vuelve a leer el superbloque
/// y los bitmaps, y persiste bitmaps, inodo y superbloque (en ese orden) antes
/// de terminar. Un solo llamador a la vez.
pub struct FileSystem<S: BackingStore> {
    store: S,
    geometry: Geometry,
}

impl FileSystem<File> {
    /// Formatea `path` con la geometría por defecto.
    pub fn format_path<P: AsRef<Path>>(path: P) -> Result<()> {
        let file = device::create_image(path)?;
        Self::format(file, Geometry::DEFAULT)?.close()?;
        Ok(())
    }

    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = device::open_image(path)?;
        Self::open(file, Geometry::DEFAULT)
    }
}

impl<S: BackingStore> FileSystem<S> {
    pub fn format(mut store: S, geometry: Geometry) -> Result<Self> {
        superblock::initialize_image(&mut store, geometry)?;
        Ok(Self { store, geometry })
    }

    pub fn open(mut store: S, geometry: Geometry) -> Result<Self> {
        let sb = superblock::open_image(&mut store, geometry)?;
        info!(
            "Imagen abierta: {} inodos libres, {} bloques libres",
            sb.free_inodes, sb.free_blocks
        );
        Ok(Self { store, geometry })
    }

    /// Baja todo al contenedor y lo devuelve.
    pub fn close(mut self) -> Result<S> {
        self.store.flush()?;
        Ok(self.store)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    // --- HELPERS INTERNOS ---

    fn load(&mut self) -> Result<Allocator> {
        let sb = superblock::open_image(&mut self.store, self.geometry)?;
        Allocator::load(&mut self.store, sb)
    }

    fn lookup(&mut self, alloc: &Allocator, name: &str) -> Result<(u32, Inode)> {
        find_by_name(&mut self.store, &alloc.sb, &alloc.inode_map, name)?
            .ok_or_else(|| FsError::NotFound(name.to_string()))
    }

    /// Persiste bitmaps, el inodo y el superbloque, en ese orden.
    fn commit(&mut self, alloc: &Allocator, index: u32, inode: &Inode) -> Result<()> {
        alloc.store_bitmaps(&mut self.store)?;
        write_inode(&mut self.store, &alloc.sb, index, inode)?;
        alloc.store_superblock(&mut self.store)?;
        self.store.flush()?;
        Ok(())
    }

    /// Escribe `data` desde el byte `start` del archivo, partiendo en los
    /// límites de bloque. Devuelve el offset donde terminó.
    fn write_span(&mut self, sb: &SuperBlock, inode: &Inode, start: usize, data: &[u8]) -> Result<usize> {
        let block_size = sb.block_size as usize;
        let mut pos = start;
        let mut written = 0;

        while written < data.len() {
            let slot = pos / block_size;
            let within = pos % block_size;
            let chunk = (block_size - within).min(data.len() - written);

            let block = inode.blocks[slot];
            if block == RESERVED_INDEX || block >= sb.block_count {
                return Err(FsError::InvalidImage(format!(
                    "'{}' apunta al bloque {} fuera de rango",
                    inode.name, block
                )));
            }
            let offset = sb.block_offset(block) + within as u64;
            self.store.write_at(offset, &data[written..written + chunk])?;

            pos += chunk;
            written += chunk;
        }
        Ok(pos)
    }

    /// Lee hasta `limit` bytes siguiendo la lista de bloques; corta en el primer centinela.
    fn read_content(&mut self, sb: &SuperBlock, inode: &Inode, limit: usize) -> Result<Vec<u8>> {
        let block_size = sb.block_size as usize;
        let mut out = Vec::with_capacity(limit);

        for &block in inode.blocks.iter() {
            if out.len() >= limit || block == RESERVED_INDEX {
                break;
            }
            if block >= sb.block_count {
                return Err(FsError::InvalidImage(format!(
                    "'{}' apunta al bloque {} fuera de rango",
                    inode.name, block
                )));
            }
            let start = out.len();
            let chunk = block_size.min(limit - start);
            out.resize(start + chunk, 0);
            self.store.read_at(sb.block_offset(block), &mut out[start..])?;
        }

        if out.len() < limit {
            warn!("Lectura corta de '{}': {} de {} bytes", inode.name, out.len(), limit);
        }
        Ok(out)
    }

    /// Reserva las ranuras `owned..required` con bloques nuevos, todo o nada.
    fn grow(alloc: &mut Allocator, inode: &mut Inode, required: usize) -> Result<()> {
        let owned = inode.owned_blocks();
        if required <= owned {
            return Ok(());
        }
        let fresh = alloc.allocate_blocks(required - owned)?;
        for (slot, block) in (owned..required).zip(fresh) {
            inode.blocks[slot] = block;
        }
        Ok(())
    }

    fn required_blocks(sb: &SuperBlock, len: usize) -> Result<usize> {
        let required = len.div_ceil(sb.block_size as usize);
        if required > DIRECT_BLOCKS {
            return Err(FsError::TooLarge { required, max: DIRECT_BLOCKS });
        }
        Ok(required)
    }

    // --- OPERACIONES ---

    pub fn create(&mut self, name: &str) -> Result<u32> {
        validate_name(name)?;
        let mut alloc = self.load()?;

        if find_by_name(&mut self.store, &alloc.sb, &alloc.inode_map, name)?.is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }

        let index = alloc.allocate_inode()?;
        let inode = Inode::new(name);
        self.commit(&alloc, index, &inode)?;

        info!("Archivo '{}' creado en el inodo {}", name, index);
        Ok(index)
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        validate_name(name)?;
        let mut alloc = self.load()?;
        let (index, inode) = self.lookup(&alloc, name)?;

        for &block in inode.blocks.iter().filter(|&&b| b != RESERVED_INDEX) {
            alloc.release_block(block);
        }
        alloc.release_inode(index);

        // La ranura vuelve a quedar en cero
        self.commit(&alloc, index, &Inode::default())?;

        info!("Archivo '{}' (inodo {}) eliminado, {} bloques liberados", name, index, inode.block_count());
        Ok(())
    }

    /// Reemplaza el contenido completo. Reusa los bloques que ya tiene, pide
    /// los que falten y devuelve los que sobren.
    pub fn overwrite(&mut self, name: &str, data: &[u8]) -> Result<()> {
        validate_name(name)?;
        let mut alloc = self.load()?;
        let (index, mut inode) = self.lookup(&alloc, name)?;

        let required = Self::required_blocks(&alloc.sb, data.len())?;
        Self::grow(&mut alloc, &mut inode, required)?;

        self.write_span(&alloc.sb, &inode, 0, data)?;

        for slot in required..DIRECT_BLOCKS {
            let block = inode.blocks[slot];
            if block != RESERVED_INDEX {
                alloc.release_block(block);
                inode.blocks[slot] = RESERVED_INDEX;
            }
        }

        inode.size = data.len() as u64;
        inode.touch();
        self.commit(&alloc, index, &inode)?;

        debug!("'{}' reescrito: {} bytes en {} bloques", name, data.len(), required);
        Ok(())
    }

    /// Agrega `data` al final. Si el archivo ya tenía contenido, antes va un salto de línea.
    pub fn append(&mut self, name: &str, data: &[u8]) -> Result<()> {
        validate_name(name)?;
        let mut alloc = self.load()?;
        let (index, mut inode) = self.lookup(&alloc, name)?;

        let separator: &[u8] = if inode.size > 0 { APPEND_SEPARATOR } else { &[] };
        let start = inode.size as usize;
        let total = start + separator.len() + data.len();

        let required = Self::required_blocks(&alloc.sb, total)?;
        Self::grow(&mut alloc, &mut inode, required)?;

        let end = self.write_span(&alloc.sb, &inode, start, separator)?;
        let end = self.write_span(&alloc.sb, &inode, end, data)?;

        inode.size = end as u64;
        inode.touch();
        self.commit(&alloc, index, &inode)?;

        debug!("'{}' extendido a {} bytes", name, end);
        Ok(())
    }

    /// Devuelve hasta `capacity - 1` bytes de contenido (un byte queda para el terminador).
    pub fn read(&mut self, name: &str, capacity: usize) -> Result<Vec<u8>> {
        validate_name(name)?;
        let alloc = self.load()?;
        let (_, inode) = self.lookup(&alloc, name)?;

        let limit = (inode.size as usize).min(capacity.saturating_sub(1));
        self.read_content(&alloc.sb, &inode, limit)
    }

    /// Igual que `read`, pero copia a `buf` y termina con un 0.
    /// Devuelve la cantidad de bytes de contenido copiados.
    pub fn read_into(&mut self, name: &str, buf: &mut [u8]) -> Result<usize> {
        let content = self.read(name, buf.len())?;
        if buf.is_empty() {
            return Ok(0);
        }
        buf[..content.len()].copy_from_slice(&content);
        buf[content.len()] = 0;
        Ok(content.len())
    }

    pub fn list(&mut self) -> Result<Vec<FileEntry>> {
        let alloc = self.load()?;
        let mut entries = Vec::new();
        for index in 1..alloc.sb.inode_count {
            if !alloc.is_inode_live(index) {
                continue;
            }
            let inode = read_inode(&mut self.store, &alloc.sb, index)?;
            entries.push(FileEntry::from_inode(index, &inode));
        }
        Ok(entries)
    }

    pub fn stat(&mut self, name: &str) -> Result<FileEntry> {
        validate_name(name)?;
        let alloc = self.load()?;
        let (index, inode) = self.lookup(&alloc, name)?;
        Ok(FileEntry::from_inode(index, &inode))
    }

    pub fn usage(&mut self) -> Result<Usage> {
        let alloc = self.load()?;
        Ok(Usage::from(&alloc.sb))
    }

    pub fn check(&mut self) -> Result<CheckReport> {
        let alloc = self.load()?;
        fsck::check(&mut self.store, &alloc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn small() -> FileSystem<Cursor<Vec<u8>>> {
        let geometry = Geometry { block_size: 64, inode_count: 8, block_count: 32 };
        FileSystem::format(Cursor::new(Vec::new()), geometry).unwrap()
    }

    #[test]
    fn test_create_list_delete() {
        let mut fs = small();
        assert_eq!(fs.create("a.txt").unwrap(), 1);
        assert_eq!(fs.create("b.txt").unwrap(), 2);

        let names: Vec<_> = fs.list().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        fs.delete("a.txt").unwrap();
        // El índice liberado se reusa primero
        assert_eq!(fs.create("c.txt").unwrap(), 1);
        assert!(fs.check().unwrap().is_clean());
    }

    #[test]
    fn test_overwrite_reuses_then_grows() {
        let mut fs = small();
        fs.create("a.txt").unwrap();
        fs.overwrite("a.txt", &[b'x'; 80]).unwrap(); // 2 bloques: 1 y 2
        fs.create("b.txt").unwrap();
        fs.overwrite("b.txt", b"hola").unwrap(); // bloque 3

        // Crece a 3 bloques: conserva 1 y 2, el nuevo es el 4
        fs.overwrite("a.txt", &[b'y'; 160]).unwrap();
        assert_eq!(fs.read("a.txt", 200).unwrap(), vec![b'y'; 160]);
        assert_eq!(fs.stat("a.txt").unwrap().block_count, 3);
        assert_eq!(fs.usage().unwrap().free_blocks, 31 - 4);

        // Se achica: devuelve los sobrantes
        fs.overwrite("a.txt", b"z").unwrap();
        assert_eq!(fs.stat("a.txt").unwrap().block_count, 1);
        assert_eq!(fs.usage().unwrap().free_blocks, 31 - 2);
        assert!(fs.check().unwrap().is_clean());
    }

    #[test]
    fn test_append_straddles_blocks() {
        let mut fs = small();
        fs.create("log").unwrap();
        fs.append("log", &[b'a'; 60]).unwrap();
        fs.append("log", b"abcdefghij").unwrap(); // cruza el borde del bloque de 64

        let mut expected = vec![b'a'; 60];
        expected.extend_from_slice(b"\nabcdefghij");
        assert_eq!(fs.read("log", 128).unwrap(), expected);
        assert_eq!(fs.stat("log").unwrap().size, expected.len() as u64);
        assert_eq!(fs.stat("log").unwrap().block_count, 2);
        assert!(fs.check().unwrap().is_clean());
    }

    #[test]
    fn test_read_into_terminates() {
        let mut fs = small();
        fs.create("a.txt").unwrap();
        fs.overwrite("a.txt", b"hola mundo").unwrap();

        let mut buf = [0xFFu8; 5];
        assert_eq!(fs.read_into("a.txt", &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"hola\0");

        let mut empty: [u8; 0] = [];
        assert_eq!(fs.read_into("a.txt", &mut empty).unwrap(), 0);
        assert!(matches!(fs.read_into("nada", &mut buf), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_overwrite_out_of_blocks_rolls_back() {
        let geometry = Geometry { block_size: 64, inode_count: 4, block_count: 4 };
        let mut fs = FileSystem::format(Cursor::new(Vec::new()), geometry).unwrap();
        fs.create("a").unwrap();
        fs.overwrite("a", b"uno").unwrap();
        let before = fs.usage().unwrap();

        // Tiene 1 bloque y quedan 2 libres, este necesita 4
        assert!(matches!(fs.overwrite("a", &[1u8; 256]), Err(FsError::NoFreeBlocks)));
        assert_eq!(fs.usage().unwrap(), before);
        assert_eq!(fs.read("a", 16).unwrap(), b"uno");
        assert!(fs.check().unwrap().is_clean());
    }

    #[test]
    fn test_append_out_of_blocks_rolls_back() {
        let geometry = Geometry { block_size: 64, inode_count: 4, block_count: 4 };
        let mut fs = FileSystem::format(Cursor::new(Vec::new()), geometry).unwrap();
        fs.create("a").unwrap();
        fs.overwrite("a", b"uno").unwrap();
        let before = fs.usage().unwrap();

        // 3 + separador + 250 = 254 bytes, 4 bloques; solo hay 1 + 2 libres
        assert!(matches!(fs.append("a", &[1u8; 250]), Err(FsError::NoFreeBlocks)));
        assert_eq!(fs.usage().unwrap(), before);
        assert_eq!(fs.stat("a").unwrap().size, 3);
        assert_eq!(fs.read("a", 16).unwrap(), b"uno");
        assert!(fs.check().unwrap().is_clean());
    }

    #[test]
    fn test_empty_overwrite_releases_every_block() {
        let mut fs = small();
        fs.create("a").unwrap();
        fs.overwrite("a", &[7u8; 160]).unwrap();
        assert_eq!(fs.stat("a").unwrap().block_count, 3);

        fs.overwrite("a", b"").unwrap();
        let entry = fs.stat("a").unwrap();
        assert_eq!(entry.size, 0);
        assert_eq!(entry.block_count, 0);
        let usage = fs.usage().unwrap();
        assert_eq!(usage.free_blocks, usage.total_blocks - 1);
        assert!(fs.read("a", 16).unwrap().is_empty());
        assert!(fs.check().unwrap().is_clean());
    }

    #[test]
    fn test_empty_append_still_adds_separator() {
        let mut fs = small();
        fs.create("a").unwrap();
        fs.append("a", b"x").unwrap();
        fs.append("a", b"").unwrap();
        assert_eq!(fs.stat("a").unwrap().size, 2);
        assert_eq!(fs.read("a", 16).unwrap(), b"x\n");
    }

    #[test]
    fn test_corrupt_pointer_is_not_written() {
        let mut fs = small();
        let index = fs.create("a").unwrap();
        let alloc = fs.load().unwrap();
        let mut inode = read_inode(&mut fs.store, &alloc.sb, index).unwrap();
        inode.size = 10;
        inode.blocks[0] = u32::MAX;
        write_inode(&mut fs.store, &alloc.sb, index, &inode).unwrap();
        let before = fs.usage().unwrap();
        let image_len = fs.store.get_ref().len();

        assert!(matches!(fs.overwrite("a", b"hola"), Err(FsError::InvalidImage(_))));
        assert!(matches!(fs.append("a", b"hola"), Err(FsError::InvalidImage(_))));
        assert!(matches!(fs.read("a", 16), Err(FsError::InvalidImage(_))));
        assert_eq!(fs.usage().unwrap(), before);
        // Nada se escribió fuera de la imagen
        assert_eq!(fs.store.get_ref().len(), image_len);

        // Borrar ignora el puntero roto y deja la imagen consistente
        fs.delete("a").unwrap();
        let after = fs.usage().unwrap();
        assert_eq!(after.free_blocks, before.free_blocks);
        assert_eq!(after.free_inodes, before.free_inodes + 1);
        assert!(fs.check().unwrap().is_clean());
    }

    #[test]
    fn test_invalid_name_has_no_side_effects() {
        let mut fs = small();
        let before = fs.usage().unwrap();
        let long = "n".repeat(300);
        assert!(matches!(fs.create(&long), Err(FsError::InvalidName(_))));
        assert!(matches!(fs.create(""), Err(FsError::InvalidName(_))));
        assert!(matches!(fs.delete(&long), Err(FsError::InvalidName(_))));
        assert_eq!(fs.usage().unwrap(), before);
        assert!(fs.list().unwrap().is_empty());
    }

    #[test]
    fn test_mutations_on_missing_file() {
        let mut fs = small();
        assert!(matches!(fs.delete("x"), Err(FsError::NotFound(_))));
        assert!(matches!(fs.overwrite("x", b"1"), Err(FsError::NotFound(_))));
        assert!(matches!(fs.append("x", b"1"), Err(FsError::NotFound(_))));
        assert!(matches!(fs.read("x", 10), Err(FsError::NotFound(_))));
        assert!(matches!(fs.stat("x"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_close_returns_store() {
        let mut fs = small();
        fs.create("a.txt").unwrap();
        let geometry = fs.geometry();
        let store = fs.close().unwrap();

        let mut reopened = FileSystem::open(store, geometry).unwrap();
        assert_eq!(reopened.stat("a.txt").unwrap().index, 1);
    }
}

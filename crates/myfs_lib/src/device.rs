use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Contenedor de bytes con acceso aleatorio donde vive toda la imagen.
///
/// Solo se asume que lo escrito es visible para lecturas posteriores
/// después de `flush`.
pub trait BackingStore {
    /// Llena `buf` completo a partir de `offset`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()>;

    fn write_at(&mut self, offset: u64, data: &[u8]) -> std::io::Result<()>;

    fn flush(&mut self) -> std::io::Result<()>;
}

impl<T: Read + Write + Seek> BackingStore for T {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> std::io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Write::flush(self)
    }
}

/// Crea (o trunca) el archivo de imagen para formatearlo.
pub fn create_image<P: AsRef<Path>>(path: P) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Abre una imagen existente en lectura/escritura.
pub fn open_image<P: AsRef<Path>>(path: P) -> std::io::Result<File> {
    OpenOptions::new().read(true).write(true).open(path)
}

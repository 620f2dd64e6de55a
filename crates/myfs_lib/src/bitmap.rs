use crate::device::BackingStore;
use crate::error::Result;
use crate::types::bitmap_bytes;

/// Conjunto de bits de largo fijo. Bit en 1 = ocupado.
///
/// El empaquetado en bytes (bit `i` en el byte `i / 8`, máscara `1 << (i % 8)`)
/// es el mismo que se guarda en disco.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    bits: Vec<u8>,
    len: usize, // Cantidad total de elementos que rastreamos
}

impl Bitmap {
    /// Crea un mapa nuevo con todo marcado como LIBRE (0).
    pub fn new(len: usize) -> Self {
        Self {
            bits: vec![0; bitmap_bytes(len as u32)],
            len,
        }
    }

    /// Reconstruye el mapa a partir de los bytes empaquetados.
    pub fn from_bytes(bytes: Vec<u8>, len: usize) -> Self {
        let mut bits = bytes;
        bits.resize(bitmap_bytes(len as u32), 0);
        Self { bits, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Verifica si un elemento está ocupado. Fuera de rango cuenta como libre.
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        (self.bits[index / 8] & (1 << (index % 8))) != 0
    }

    pub fn set(&mut self, index: usize) {
        if index >= self.len {
            return;
        }
        self.bits[index / 8] |= 1 << (index % 8);
    }

    pub fn clear(&mut self, index: usize) {
        if index >= self.len {
            return;
        }
        self.bits[index / 8] &= !(1 << (index % 8));
    }

    /// Primer bit en 0 recorriendo en orden ascendente (first-fit).
    pub fn first_clear(&self) -> Option<usize> {
        for (byte_idx, &byte) in self.bits.iter().enumerate() {
            if byte == 0xFF {
                continue;
            }
            let index = byte_idx * 8 + (!byte).trailing_zeros() as usize;
            return (index < self.len).then_some(index);
        }
        None // Mapa lleno
    }

    pub fn count_set(&self) -> usize {
        (0..self.len).filter(|&i| self.get(i)).count()
    }

    pub fn count_clear(&self) -> usize {
        self.len - self.count_set()
    }

    pub fn load<S: BackingStore>(store: &mut S, offset: u64, len: usize) -> Result<Self> {
        let mut bytes = vec![0u8; bitmap_bytes(len as u32)];
        store.read_at(offset, &mut bytes)?;
        Ok(Self::from_bytes(bytes, len))
    }

    pub fn store<S: BackingStore>(&self, store: &mut S, offset: u64) -> Result<()> {
        store.write_at(offset, &self.bits)?;
        Ok(())
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("Error de IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Imagen inválida: {0}")]
    InvalidImage(String),
    #[error("Nombre de archivo inválido: {0}")]
    InvalidName(String),
    #[error("El archivo '{0}' ya existe")]
    AlreadyExists(String),
    #[error("El archivo '{0}' no existe")]
    NotFound(String),
    #[error("No quedan inodos libres")]
    NoFreeInodes,
    #[error("No quedan bloques libres")]
    NoFreeBlocks,
    #[error("El archivo necesita {required} bloques (máximo {max})")]
    TooLarge { required: usize, max: usize },
    #[error("Registro en disco ilegible: {0}")]
    Codec(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, FsError>;

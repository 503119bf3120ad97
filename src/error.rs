use std::io;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("invalid file name")]
    InvalidFileName,
    #[error("file name too long")]
    NameTooLong,
    #[error("bad file descriptor")]
    BadDescriptor,
    #[error("offset or length out of bounds")]
    OutOfBounds,
    #[error("block {0} is out of range")]
    InvalidBlockId(usize),
    #[error("buffer length does not match the block size")]
    BadBufferSize,
    #[error("invalid volume configuration")]
    InvalidConfig,
    #[error("file not found")]
    NotFound,
    #[error("file already exists")]
    AlreadyExists,
    #[error("directory is full")]
    DirectoryFull,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("no free data blocks")]
    OutOfSpace,
    #[error("file would exceed the volume capacity")]
    FileTooLarge,
    #[error("device is not open")]
    DeviceNotOpen,
    #[error("device is already open")]
    DeviceBusy,
    #[error("file is open")]
    FileBusy,
    #[error("invalid superblock")]
    InvalidSuperBlock,
    #[error("corrupt filesystem metadata")]
    CorruptMetadata,
    #[error("short block transfer")]
    ShortIo,
    #[error("I/O error: {0}")]
    Io(io::ErrorKind),
}

/// Coarse classification of [`FsError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    AlreadyExists,
    ResourceExhausted,
    InvalidState,
    IoFailure,
}

impl FsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::InvalidFileName
            | FsError::NameTooLong
            | FsError::BadDescriptor
            | FsError::OutOfBounds
            | FsError::InvalidBlockId(_)
            | FsError::BadBufferSize
            | FsError::InvalidConfig => ErrorKind::InvalidArgument,
            FsError::NotFound => ErrorKind::NotFound,
            FsError::AlreadyExists => ErrorKind::AlreadyExists,
            FsError::DirectoryFull
            | FsError::TooManyOpenFiles
            | FsError::OutOfSpace
            | FsError::FileTooLarge => ErrorKind::ResourceExhausted,
            FsError::DeviceNotOpen
            | FsError::DeviceBusy
            | FsError::FileBusy
            | FsError::InvalidSuperBlock
            | FsError::CorruptMetadata => ErrorKind::InvalidState,
            FsError::ShortIo | FsError::Io(_) => ErrorKind::IoFailure,
        }
    }
}

impl From<io::Error> for FsError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof | io::ErrorKind::WriteZero => FsError::ShortIo,
            kind => FsError::Io(kind),
        }
    }
}

pub type Result<T> = core::result::Result<T, FsError>;

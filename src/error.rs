use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("configuration error")]
    Config,
    #[display("cannot organize {}", _0.display())]
    Directory(#[error(not(source))] PathBuf),
    #[display("invalid pipeline")]
    Parse,
    #[display("pipeline failed")]
    Pipeline,
}

pub mod archive;
pub mod cert;
pub mod reach;

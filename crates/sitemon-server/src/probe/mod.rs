pub mod cert;
pub mod reach;

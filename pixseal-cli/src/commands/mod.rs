pub mod keygen;
pub mod seal;
pub mod verify;

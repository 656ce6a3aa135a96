pub mod enime;
pub mod traits;

//! Archive + TOT resource loader (Component E): directory scan, STK/ITK
//! index parsing, LZSS decompression, and TOT/EXT resource tables.

pub mod gamedir;
pub mod lzss;
pub mod tot;

pub use gamedir::GameDir;
pub use tot::TotFile;

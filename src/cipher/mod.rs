// SQLCipher handle module
//
// - connection: the serialized `CipherConnection` handle and its blocking bridge
// - open: the connection factory (key, KDF work factor, WAL verification)

pub mod connection;
pub mod open;

pub use connection::CipherConnection;
pub use open::{open, open_database};

// Skiff — headless webhook chat, paged record browsing, and CORS relaying.
//
// The library is two layers:
//   atoms/   — constants, the error enum, and plain data types (no I/O)
//   engine/  — normalizer, page browser, chat client, relay, preferences
//
// The `skiff` binary in main.rs is one consumer; the engine works just as
// well embedded elsewhere.

pub mod atoms;
pub mod engine;

pub use atoms::error::{EngineError, EngineResult};

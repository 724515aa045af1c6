// ── Storage collaborators ───────────────────────────────────────────────────
//
// Persistence is owned by the host; the engine only talks to these
// interfaces. `MemoryStore` is the default adapter and the test double.

pub mod cache;
pub mod kv;
pub mod profile_store;

pub use cache::AnalysisCache;
pub use kv::{KvStore, MemoryStore};
pub use profile_store::ProfileStore;

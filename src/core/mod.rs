// ─── Launcher resource backend ───
// Import, identification and deployment of user content for a Minecraft
// launcher.
//
// Architecture:
//   core/
//     resource/   — Type registry, builder, index, sidecar store, import service
//     instance/   — Instance model + CRUD manager + deployment
//     downloader/ — SHA-1 validated downloads for URL imports
//     state/      — Data directory bootstrap and settings
//     hash.rs     — Content hashing and file type sniffing
//     fs.rs       — Link/copy, atomic writes, path helpers

pub mod downloader;
pub mod error;
pub mod fs;
pub mod hash;
pub mod http;
pub mod instance;
pub mod resource;
pub mod state;

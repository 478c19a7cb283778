use std::io::{Cursor, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::model::{Resource, ResourceDomain, ResourceMetadata, ResourceType};
use crate::core::fs::{FileId, FileStamp};

/// In-memory zip archive with the given text entries.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Stamp of a 10 byte source file with inode `ino` on device 1.
pub fn stamp(ino: u64, modified_secs: i64) -> FileStamp {
    FileStamp {
        id: FileId { dev: 1, ino },
        size: 10,
        modified: DateTime::from_timestamp(modified_secs, 0).unwrap(),
    }
}

/// Minimal forge mod record for index and event tests, imported from the
/// source file with inode `ino` (none when 0).
pub fn resource(hash: &str, path: &str, ino: u64, source_uris: &[&str]) -> Resource {
    Resource {
        hash: hash.to_string(),
        name: hash.to_string(),
        file_name: format!("{}.jar", hash),
        ext: ".jar".to_string(),
        resource_type: ResourceType::Forge,
        domain: ResourceDomain::Mods,
        metadata: ResourceMetadata::Unknown,
        icon: None,
        uri: format!("forge://{}/1", hash),
        source_uris: source_uris.iter().map(|s| s.to_string()).collect(),
        curseforge: None,
        source_files: if ino == 0 { Vec::new() } else { vec![stamp(ino, 0)] },
        created_at: Utc::now(),
        path: PathBuf::from(path),
        ino,
        size: 10,
    }
}

pub const FABRIC_MOD_JSON: &str = r#"{
    "schemaVersion": 1,
    "id": "sodium",
    "version": "0.5.8",
    "name": "Sodium",
    "description": "Rendering engine",
    "authors": ["jellysquid3"],
    "depends": { "minecraft": "1.20.1" }
}"#;

/// A fabric mod jar named Sodium 0.5.8.
pub fn fabric_jar() -> Vec<u8> {
    zip_bytes(&[("fabric.mod.json", FABRIC_MOD_JSON)])
}

/// Serve a single HTTP response on a loopback port. Returns the URL to fetch.
pub async fn serve_once(status: u16, body: Vec<u8>) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        let head = format!(
            "HTTP/1.1 {} Status\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            status,
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(&body).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{}/files/download.jar", addr)
}

use std::io;
use std::path::{Path, PathBuf};

use log::info;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::models::StagedFile;

const FALLBACK_NAME: &str = "attachment";

pub async fn read_staged_file(path: impl AsRef<Path>) -> io::Result<StagedFile> {
    let path = path.as_ref();
    let bytes = fs::read(path).await?;
    let filename = sanitize_filename(&path.to_string_lossy());
    Ok(StagedFile { filename, bytes })
}

pub fn sanitize_filename(name: &str) -> String {
    let normalized = normalize_path(name);
    let base = normalized.rsplit('/').next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

fn normalize_path(path: &str) -> String {
    path.replace("\\\\", "/").replace('\\', "/")
}

fn numbered(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, n, ext),
        _ => format!("{} ({})", name, n),
    }
}

pub async fn save_download(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
    fs::create_dir_all(dir).await?;
    let name = sanitize_filename(name);
    let mut n = 0;
    loop {
        let path = dir.join(numbered(&name, n));
        match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
            Ok(mut file) => {
                file.write_all(bytes).await?;
                file.flush().await?;
                info!("Saved {} bytes to {}", bytes.len(), path.display());
                return Ok(path);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(e) => return Err(e),
        }
    }
}

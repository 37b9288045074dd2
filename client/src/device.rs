//! Device identity providers. The driver app binds its session to whatever
//! id the provider returns, so it must stay stable across restarts.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::OnceLock,
};
use uuid::Uuid;

pub trait DeviceIdentity: Send + Sync {
    fn device_id(&self) -> io::Result<String>;
}

/// Generates `device-<uuid>` on first use and persists it to a file.
#[derive(Debug)]
pub struct FileDeviceIdentity {
    path: PathBuf,
    cached: OnceLock<String>,
}

impl FileDeviceIdentity {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_or_create(&self) -> io::Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(stored) if !stored.trim().is_empty() => return Ok(stored.trim().to_string()),
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }

        let id = format!("device-{}", Uuid::new_v4());
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, &id)?;
        tracing::info!(path = %self.path.display(), "Generated new device id");
        Ok(id)
    }
}

impl DeviceIdentity for FileDeviceIdentity {
    fn device_id(&self) -> io::Result<String> {
        if let Some(id) = self.cached.get() {
            return Ok(id.clone());
        }
        let id = self.load_or_create()?;
        Ok(self.cached.get_or_init(|| id).clone())
    }
}

#[derive(Debug, Clone)]
pub struct FixedDeviceIdentity(pub String);

impl DeviceIdentity for FixedDeviceIdentity {
    fn device_id(&self) -> io::Result<String> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("bustrack-client-{}", Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn file_identity_is_generated_once_and_reused() {
        let path = temp_path("device_id");
        let first = FileDeviceIdentity::new(&path).device_id().expect("generate");
        assert!(first.starts_with("device-"));

        let reopened = FileDeviceIdentity::new(&path);
        assert_eq!(reopened.device_id().expect("reload"), first);
        assert_eq!(reopened.device_id().expect("cached"), first);

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn blank_file_is_regenerated() {
        let path = temp_path("device_id");
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "  \n").expect("write");

        let id = FileDeviceIdentity::new(&path).device_id().expect("generate");
        assert!(id.starts_with("device-"));
        assert_eq!(fs::read_to_string(&path).expect("read"), id);

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn fixed_identity_returns_value() {
        let identity = FixedDeviceIdentity("phone-1".into());
        assert_eq!(identity.device_id().expect("id"), "phone-1");
    }
}

//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`MappingPort`] for the bus node.
//! Both documents are postcard blobs in the `busnode` namespace:
//!
//! | Key | Blob |
//! |---|---|
//! | `nodecfg` | [`NodeConfig`] |
//! | `instmap` | [`InstanceMap`], keyed by full sensor identifier |
//!
//! - Config validation: every field is range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().
//! - The instance map is cached in RAM; a write only replaces the cache
//!   once the blob is committed.

use core::cell::RefCell;

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, MappingPort, StorageError};
use crate::config::{DEFAULT_INSTANCE, InstanceMap, NodeConfig};
use crate::sensors::SensorId;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "busnode";
const CONFIG_KEY: &str = "nodecfg";
const MAP_KEY: &str = "instmap";

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 4000;

pub struct NvsAdapter {
    map: RefCell<InstanceMap>,
    #[cfg(not(target_os = "espidf"))]
    store: RefCell<HashMap<&'static str, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash and load the instance map.
    ///
    /// On first boot or after a version mismatch the NVS partition is
    /// erased and re-initialised automatically.  A corrupt map blob is
    /// replaced by an empty table.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any other NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        let adapter = Self {
            map: RefCell::new(InstanceMap::new()),
            #[cfg(not(target_os = "espidf"))]
            store: RefCell::new(HashMap::new()),
        };
        adapter.reload_map();
        Ok(adapter)
    }

    /// Re-read the instance map from flash into the cache.
    pub fn reload_map(&self) {
        let map = match self.read_blob(MAP_KEY) {
            Ok(Some(bytes)) => postcard::from_bytes(&bytes).unwrap_or_else(|_| {
                warn!("NvsAdapter: instance map corrupted, starting empty");
                InstanceMap::new()
            }),
            Ok(None) => InstanceMap::new(),
            Err(e) => {
                warn!("NvsAdapter: instance map unreadable ({}), starting empty", e);
                InstanceMap::new()
            }
        };
        info!("NvsAdapter: {} instance mapping(s)", map.len());
        *self.map.borrow_mut() = map;
    }

    fn persist_map(&self, map: &InstanceMap) -> Result<(), ConfigError> {
        let bytes = postcard::to_allocvec(map).map_err(|_| ConfigError::IoError)?;
        self.write_blob(MAP_KEY, &bytes)?;
        Ok(())
    }

    // ── Blob backend ──────────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self, key: &'static str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.store.borrow().get(key).cloned())
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, key: &'static str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        self.store.borrow_mut().insert(key, data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self, key: &'static str) -> Result<Option<Vec<u8>>, StorageError> {
        let key_buf = nvs_key(key);
        let result = with_nvs_handle(false, |handle| {
            let mut size: usize = 0;

            // First call: get size
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_FAIL);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
            Err(e) => {
                warn!("NvsAdapter: read '{}' failed ({})", key, e);
                Err(StorageError::IoError)
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, key: &'static str, data: &[u8]) -> Result<(), StorageError> {
        let key_buf = nvs_key(key);
        let result = with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    key_buf.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
            Err(e) => {
                warn!("NvsAdapter: write '{}' failed ({})", key, e);
                Err(StorageError::IoError)
            }
        }
    }
}

/// NUL-terminated key for the C API (NVS keys are at most 15 bytes).
#[cfg(target_os = "espidf")]
fn nvs_key(key: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let bytes = key.as_bytes();
    let len = bytes.len().min(15);
    buf[..len].copy_from_slice(&bytes[..len]);
    buf
}

/// Open the node namespace, run `f` with the handle, then close.
#[cfg(target_os = "espidf")]
fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
where
    F: FnOnce(nvs_handle_t) -> Result<T, i32>,
{
    let ns = nvs_key(NAMESPACE);
    let mut handle: nvs_handle_t = 0;
    let mode = if write {
        nvs_open_mode_t_NVS_READWRITE
    } else {
        nvs_open_mode_t_NVS_READONLY
    };

    let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
    if ret != ESP_OK {
        return Err(ret);
    }

    let result = f(handle);
    unsafe {
        nvs_close(handle);
    }
    result
}

// ───────────────────────────────────────────────────────────────
// ConfigPort
// ───────────────────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        let Some(bytes) = self.read_blob(CONFIG_KEY)? else {
            info!("NvsAdapter: no stored config, using defaults");
            return Ok(NodeConfig::default());
        };
        let cfg: NodeConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(CONFIG_KEY, &bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// MappingPort
// ───────────────────────────────────────────────────────────────

impl MappingPort for NvsAdapter {
    fn instance_for(&self, sensor: &SensorId) -> u8 {
        let known = self.map.borrow().get(sensor);
        if let Some(instance) = known {
            return instance;
        }

        let mut map = self.map.borrow().clone();
        match map.set(sensor, DEFAULT_INSTANCE) {
            Ok(()) => match self.persist_map(&map) {
                Ok(()) => {
                    info!("NvsAdapter: new probe {} -> instance {}", sensor, DEFAULT_INSTANCE);
                    *self.map.borrow_mut() = map;
                }
                Err(e) => warn!("NvsAdapter: could not persist mapping for {}: {}", sensor, e),
            },
            Err(e) => warn!("NvsAdapter: cannot map {}: {}", sensor, e),
        }
        DEFAULT_INSTANCE
    }

    fn set_instance(&self, sensor: &SensorId, instance: u8) -> Result<(), ConfigError> {
        let mut map = self.map.borrow().clone();
        map.set(sensor, instance)?;
        self.persist_map(&map)?;
        *self.map.borrow_mut() = map;
        Ok(())
    }

    fn mappings(&self) -> InstanceMap {
        self.map.borrow().clone()
    }
}

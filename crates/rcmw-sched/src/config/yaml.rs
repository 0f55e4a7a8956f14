// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML scheduler configuration loader.
//!
//! The document layout is the one shown in the [`config`](crate::config)
//! module docs. Every field is optional; missing fields take their
//! `Default`.

use super::RcmwConf;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

/// YAML configuration loader.
pub struct YamlLoader;

impl YamlLoader {
    /// Load a configuration document from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<RcmwConf> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigFileNotFound(path.display().to_string()));
        }
        let yaml_content = fs::read_to_string(path)?;
        Self::parse_yaml(&yaml_content)
    }

    /// Parse and validate YAML content.
    pub fn parse_yaml(yaml_content: &str) -> Result<RcmwConf> {
        let conf: RcmwConf = serde_yaml::from_str(yaml_content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse YAML: {}", e)))?;
        Self::validate(&conf)?;
        Ok(conf)
    }

    fn validate(conf: &RcmwConf) -> Result<()> {
        for group in &conf.scheduler_conf.classic_conf.groups {
            if group.name.is_empty() {
                return Err(Error::InvalidConfig("group without a name".to_string()));
            }
            if group.processor_num == 0 {
                return Err(Error::InvalidConfig(format!(
                    "group '{}' has no processors",
                    group.name
                )));
            }
            if let Some(task) = group.tasks.iter().find(|t| t.name.is_empty()) {
                return Err(Error::InvalidConfig(format!(
                    "group '{}' has a task without a name (prio {})",
                    group.name, task.prio
                )));
            }
        }
        Ok(())
    }
}

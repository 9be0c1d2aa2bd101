#![allow(dead_code)]

use std::collections::BTreeMap;

use jobdag::config::{ConfigFile, ConfigSection, JobConfig, NestedConfig, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                job: BTreeMap::new(),
                scheduler: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn with_scheduler(mut self, name: &str, nested: NestedConfig) -> Self {
        self.config.scheduler.insert(name.to_string(), nested);
        self
    }

    pub fn jobs_window(mut self, n: usize) -> Self {
        self.config.config.jobs_window = Some(n);
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.config.config.timeout = Some(duration.to_string());
        self
    }

    pub fn shutdown_timeout(mut self, duration: &str) -> Self {
        self.config.config.shutdown_timeout = Some(duration.to_string());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            job: JobConfig {
                cmd: cmd.to_string(),
                label: None,
                critical: true,
                forever: false,
                requires: vec![],
                scheduler: None,
            },
        }
    }

    pub fn requires(mut self, dep: &str) -> Self {
        self.job.requires.push(dep.to_string());
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.job.label = Some(label.to_string());
        self
    }

    pub fn critical(mut self, val: bool) -> Self {
        self.job.critical = val;
        self
    }

    pub fn forever(mut self, val: bool) -> Self {
        self.job.forever = val;
        self
    }

    pub fn scheduler(mut self, name: &str) -> Self {
        self.job.scheduler = Some(name.to_string());
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}

/// Builder for `NestedConfig`.
pub struct NestedConfigBuilder {
    nested: NestedConfig,
}

impl NestedConfigBuilder {
    pub fn new() -> Self {
        Self {
            nested: NestedConfig {
                label: None,
                jobs_window: None,
                timeout: None,
                shutdown_timeout: None,
                critical: true,
                forever: false,
                requires: vec![],
                scheduler: None,
            },
        }
    }

    pub fn requires(mut self, dep: &str) -> Self {
        self.nested.requires.push(dep.to_string());
        self
    }

    pub fn jobs_window(mut self, n: usize) -> Self {
        self.nested.jobs_window = Some(n);
        self
    }

    pub fn timeout(mut self, duration: &str) -> Self {
        self.nested.timeout = Some(duration.to_string());
        self
    }

    pub fn critical(mut self, val: bool) -> Self {
        self.nested.critical = val;
        self
    }

    pub fn parent(mut self, name: &str) -> Self {
        self.nested.scheduler = Some(name.to_string());
        self
    }

    pub fn build(self) -> NestedConfig {
        self.nested
    }
}

impl Default for NestedConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

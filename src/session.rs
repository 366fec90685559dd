//! Editing session tying the document, its fields, discovery and the worker
//!
//! The session is the owning context: it alone mutates the document and the
//! field set. Discovery results and worker state are pulled in by [`ConfigSession::poll`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::audio_devices::AudioDevice;
use crate::config::{ConfigDocument, ConfigError, ConfigStore};
use crate::discovery::{DeviceDiscovery, DiscoveryConfig, ScanOutcome};
use crate::fields::FieldSet;
use crate::status::{ShutdownMode, Status, StatusSender};
use crate::supervisor::{ProcessError, ProcessSupervisor, StartOutcome, WorkerState};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Worker executable
    pub worker: PathBuf,
    pub discovery: DiscoveryConfig,
    pub shutdown_timeout: Duration,
}

pub struct ConfigSession {
    store: ConfigStore,
    document: ConfigDocument,
    fields: FieldSet,
    devices: Vec<AudioDevice>,
    supervisor: Arc<ProcessSupervisor>,
    discovery: DeviceDiscovery,
    worker: PathBuf,
    status: StatusSender,
}

impl ConfigSession {
    /// Load the live configuration, creating it from the template on first run.
    ///
    /// A missing template is fatal.
    pub fn open(
        store: ConfigStore,
        options: SessionOptions,
        devices: Vec<AudioDevice>,
        status: StatusSender,
    ) -> Result<Self, ConfigError> {
        if store.ensure_config()? {
            info!(path = %store.config_path().display(), "Created configuration from template");
        }
        let document = store.load_config()?;
        let fields = FieldSet::render(&document, devices.clone());

        Ok(Self {
            store,
            document,
            fields,
            devices,
            supervisor: Arc::new(ProcessSupervisor::with_timeout(status.clone(), options.shutdown_timeout)),
            discovery: DeviceDiscovery::new(options.discovery, status.clone()),
            worker: options.worker,
            status,
        })
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    #[cfg(test)]
    pub fn fields(&self) -> &FieldSet {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }

    pub fn worker_path(&self) -> &Path {
        &self.worker
    }

    pub fn worker_state(&self) -> WorkerState {
        self.supervisor.state()
    }

    pub fn worker_pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }

    /// Recent stderr output of the current or last worker
    pub fn worker_stderr(&self) -> String {
        self.supervisor.stderr_tail()
    }

    pub fn is_discovering(&self) -> bool {
        self.discovery.is_running()
    }

    /// Collect the fields and persist them. Nothing is written on failure.
    pub fn save(&mut self) -> Result<(), ConfigError> {
        self.status.send(Status::Saving);

        let collected = match self.fields.collect() {
            Ok(doc) => doc,
            Err(err) => {
                error!(error = %err, kind = err.as_label(), "Configuration rejected");
                self.status.send(Status::ValidationFailed(err.to_string()));
                return Err(err);
            }
        };

        if let Err(err) = self.store.save_config(&collected) {
            error!(path = %self.store.config_path().display(), error = %err, kind = err.as_label(), "Failed to save configuration");
            self.status.send(Status::SaveFailed(err.to_string()));
            return Err(err);
        }

        self.fields.rebase(&collected);
        self.document = collected;
        self.status.send(Status::Saved);
        Ok(())
    }

    /// Replace the in-memory document with the template and rescan for lights.
    ///
    /// The template's own addresses are kept and discovered lights are appended
    /// to them. The file on disk is untouched until the next save.
    pub fn reset_to_default(&mut self) -> Result<(), ConfigError> {
        let document = match self.store.reset_to_default() {
            Ok(doc) => doc,
            Err(err) => {
                error!(error = %err, kind = err.as_label(), "Failed to load default configuration");
                self.status.send(Status::ResetFailed(err.to_string()));
                return Err(err);
            }
        };

        self.fields = FieldSet::render(&document, self.devices.clone());
        self.document = document;
        self.status.send(Status::ResetToDefault);

        self.start_discovery();
        Ok(())
    }

    /// Add whatever is typed in the new-address entry
    pub fn add_entered_light_ip(&mut self) -> Result<(), ConfigError> {
        match self.fields.network.add_entered() {
            Ok(_) => {
                self.sync_addresses();
                Ok(())
            }
            Err(err) => {
                self.status.send(Status::ValidationFailed(err.to_string()));
                Err(err)
            }
        }
    }

    pub fn remove_selected_light_ip(&mut self) -> Option<String> {
        let ip = self.fields.network.remove_selected()?;
        self.document.remove_light_ip(&ip);
        Some(ip)
    }

    fn sync_addresses(&mut self) {
        self.document
            .set_light_ips(self.fields.network.addresses().to_vec());
    }

    pub fn start_discovery(&mut self) -> bool {
        self.discovery.start()
    }

    /// Merge finished discovery results and check the worker
    pub fn poll(&mut self) -> WorkerState {
        if let Some(outcome) = self.discovery.try_take() {
            self.apply_discovery(outcome);
        }
        self.supervisor.poll()
    }

    /// Block until the running scan ends and merge its results
    #[cfg(test)]
    pub fn wait_for_discovery(&mut self) {
        if let Some(outcome) = self.discovery.wait() {
            self.apply_discovery(outcome);
        }
    }

    pub(crate) fn apply_discovery(&mut self, outcome: ScanOutcome) {
        match outcome {
            Ok(devices) => {
                let addresses: Vec<String> = devices.iter().map(|d| d.address.to_string()).collect();
                let added = self.fields.network.merge(&addresses);
                self.sync_addresses();
                debug!(found = addresses.len(), added = ?added, "Merged discovered lights");
                self.status.send(Status::DiscoveryFinished {
                    found: addresses.len(),
                    added: added.len(),
                });
            }
            Err(err) => {
                error!(error = %err, kind = err.as_label(), "Discovery failed");
                self.status.send(Status::DiscoveryFailed(err.to_string()));
            }
        }
    }

    /// Save the current fields, then start the worker on the saved file
    pub fn launch_worker(&mut self) -> Result<Option<StartOutcome>, ProcessError> {
        if self.save().is_err() {
            return Ok(None);
        }
        self.supervisor
            .start(&self.worker, self.store.config_path())
            .map(Some)
    }

    /// Stop the worker without blocking the caller
    pub fn stop_worker(&self) {
        if self.supervisor.is_running() {
            self.supervisor.stop_in_background();
        }
    }

    /// Stop the worker and wait for it; used on exit
    pub fn shutdown(&self) -> Result<Option<ShutdownMode>, ProcessError> {
        self.supervisor.stop()
    }
}

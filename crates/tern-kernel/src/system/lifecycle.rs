//! Module lifecycle operations
//!
//! Thin wrappers over the core module manager that log through the HAL and
//! move the manager's commits into CommitLog.

use alloc::format;

use tern_hal::HAL;
use tern_kernel_core::{manager, ModuleDescriptor, ModuleId, Region, Status, StopReport, ThreadRunner};

use super::System;
use crate::error::KernelError;

fn refused(operation: &'static str, status: Status) -> Result<(), KernelError> {
    match status {
        Status::Success => Ok(()),
        status => Err(KernelError::Refused { operation, status }),
    }
}

impl<H: HAL> System<H> {
    /// Create the shared object pool over `size` bytes at `start`.
    pub fn create_object_pool(&mut self, start: u32, size: u32) -> Result<(), KernelError> {
        let region = Region::new(start, size).ok_or(KernelError::PoolRegion { start, size })?;
        let result = refused("object pool create", manager::object_pool_create(&mut self.state, region));
        self.flush_commits();
        match &result {
            Ok(()) => self.hal.debug_write(&format!(
                "[module-manager] object pool {:#010x}..{:#010x} created",
                region.start, region.end
            )),
            Err(e) => self.hal.debug_write(&format!("[module-manager] {e}")),
        }
        result
    }

    /// Validate a descriptor and load the module it describes.
    pub fn load_module(&mut self, descriptor: &ModuleDescriptor) -> Result<ModuleId, KernelError> {
        let result = manager::load(&mut self.state, descriptor);
        self.flush_commits();
        match result {
            Ok(id) => {
                self.hal.debug_write(&format!(
                    "[module-manager] loaded '{}' as module {} (code {:#010x}, data {:#010x})",
                    descriptor.name, id.0, descriptor.code_start, descriptor.data_start
                ));
                Ok(id)
            }
            Err(status) => {
                self.hal.debug_write(&format!(
                    "[module-manager] load of '{}' refused: {status:?}",
                    descriptor.name
                ));
                Err(KernelError::Refused {
                    operation: "load",
                    status,
                })
            }
        }
    }

    /// Load a module from a JSON descriptor.
    pub fn load_module_json(&mut self, json: &str) -> Result<ModuleId, KernelError> {
        let descriptor: ModuleDescriptor = serde_json::from_str(json)?;
        self.load_module(&descriptor)
    }

    pub fn start_module(&mut self, module: ModuleId) -> Result<(), KernelError> {
        let result = refused("start", manager::start(&mut self.state, module));
        self.flush_commits();
        match &result {
            Ok(()) => self
                .hal
                .debug_write(&format!("[module-manager] module {} started", module.0)),
            Err(e) => self
                .hal
                .debug_write(&format!("[module-manager] module {}: {e}", module.0)),
        }
        result
    }

    /// Stop a module, giving its stop routine time slices through `runner`,
    /// and reclaim everything it owns.
    pub fn stop_module(
        &mut self,
        module: ModuleId,
        runner: &mut dyn ThreadRunner,
    ) -> Result<StopReport, KernelError> {
        let result = manager::stop(&mut self.state, module, runner);
        self.flush_commits();
        match result {
            Ok(report) => {
                if !report.stop_routine_completed {
                    self.hal.debug_write(&format!(
                        "[module-manager] module {} stop routine did not finish, terminated",
                        module.0
                    ));
                }
                self.hal.debug_write(&format!(
                    "[module-manager] module {} stopped: {} objects deleted, {} pool objects freed",
                    module.0, report.objects_deleted, report.pool_objects_freed
                ));
                Ok(report)
            }
            Err(status) => {
                self.hal.debug_write(&format!(
                    "[module-manager] stop of module {} refused: {status:?}",
                    module.0
                ));
                Err(KernelError::Refused {
                    operation: "stop",
                    status,
                })
            }
        }
    }

    pub fn unload_module(&mut self, module: ModuleId) -> Result<(), KernelError> {
        let result = refused("unload", manager::unload(&mut self.state, module));
        self.flush_commits();
        match &result {
            Ok(()) => self
                .hal
                .debug_write(&format!("[module-manager] module {} unloaded", module.0)),
            Err(e) => self
                .hal
                .debug_write(&format!("[module-manager] module {}: {e}", module.0)),
        }
        result
    }
}

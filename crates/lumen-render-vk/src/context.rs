// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;

use anyhow::{anyhow, Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle};
use tracing::{debug, info};

use crate::debug::{validation_request, Messenger};

/// First queue family with at least one queue and graphics support.
///
/// No scoring: the first match wins, even if a later family would also
/// present or has more queues.
pub fn first_graphics_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| {
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|index| index as u32)
}

// STRICT TEARDOWN ORDER: surface, messenger, instance.
struct InstanceScope {
    _entry: Entry,
    instance: Instance,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
    messenger: Option<Messenger>,
}

impl InstanceScope {
    unsafe fn new(window: &dyn HasWindowHandle, display: &dyn HasDisplayHandle) -> Result<Self> {
        let dh = display
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let wh = window.window_handle().map_err(|e| anyhow!("{e}"))?.as_raw();

        let entry = Entry::linked();
        let validation = validation_request(&entry);
        let instance = create_instance(&entry, dh, &validation.layers, &validation.extensions)
            .context("create_instance")?;

        let mut scope = InstanceScope {
            surface_loader: surface::Instance::new(&entry, &instance),
            _entry: entry,
            instance,
            surface: vk::SurfaceKHR::null(),
            messenger: None,
        };
        if validation.enabled() {
            scope.messenger = Some(
                Messenger::new(&scope._entry, &scope.instance).context("create debug messenger")?,
            );
            info!("validation layer enabled");
        }
        scope.surface = ash_window::create_surface(&scope._entry, &scope.instance, dh, wh, None)
            .context("ash_window::create_surface")?;
        Ok(scope)
    }
}

impl Drop for InstanceScope {
    fn drop(&mut self) {
        unsafe {
            // null surface is a no-op
            self.surface_loader.destroy_surface(self.surface, None);
            if let Some(messenger) = self.messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    layers: &[*const std::ffi::c_char],
    extra_extensions: &[*const std::ffi::c_char],
) -> Result<Instance> {
    let app = c"lumen";
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app.as_ptr(),
        application_version: 0,
        p_engine_name: app.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut extensions = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?
        .to_vec();
    extensions.extend_from_slice(extra_extensions);

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    Ok(entry.create_instance(&create_info, None)?)
}

/// First physical device exposing a graphics queue family.
unsafe fn pick_device_and_queue(instance: &Instance) -> Result<(vk::PhysicalDevice, u32)> {
    for phys in instance.enumerate_physical_devices()? {
        let families = instance.get_physical_device_queue_family_properties(phys);
        if let Some(family) = first_graphics_family(&families) {
            return Ok((phys, family));
        }
    }
    Err(anyhow!("no physical device with a graphics queue family"))
}

/// Logical device, its single graphics queue, and the instance and window
/// surface it was created against.
///
/// Dropped last: waits for the device to go idle, then destroys the device,
/// the surface and the instance.
pub struct VkContext {
    device: ash::Device,
    swapchain_loader: swapchain::Device,
    queue: vk::Queue,
    queue_family: u32,
    phys: vk::PhysicalDevice,
    scope: InstanceScope,
}

impl VkContext {
    pub fn new(window: &dyn HasWindowHandle, display: &dyn HasDisplayHandle) -> Result<Self> {
        unsafe {
            let scope = InstanceScope::new(window, display)?;
            let (phys, queue_family) = pick_device_and_queue(&scope.instance)?;

            let props = scope.instance.get_physical_device_properties(phys);
            let name = CStr::from_ptr(props.device_name.as_ptr()).to_string_lossy();
            info!(
                "using {} (Vulkan {}.{}), queue family {}",
                name,
                vk::api_version_major(props.api_version),
                vk::api_version_minor(props.api_version),
                queue_family
            );

            let priorities = [1.0_f32];
            let qinfo = vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: queue_family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            };
            let device_exts = [swapchain::NAME.as_ptr()];
            let dinfo = vk::DeviceCreateInfo {
                s_type: vk::StructureType::DEVICE_CREATE_INFO,
                queue_create_info_count: 1,
                p_queue_create_infos: &qinfo,
                enabled_extension_count: device_exts.len() as u32,
                pp_enabled_extension_names: device_exts.as_ptr(),
                ..Default::default()
            };
            let device = scope
                .instance
                .create_device(phys, &dinfo, None)
                .context("create_device")?;
            let queue = device.get_device_queue(queue_family, 0);
            let swapchain_loader = swapchain::Device::new(&scope.instance, &device);
            debug!("logical device ready");

            Ok(Self {
                device,
                swapchain_loader,
                queue,
                queue_family,
                phys,
                scope,
            })
        }
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.scope.surface
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &Instance {
        &self.scope.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.phys
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub(crate) fn surface_loader(&self) -> &surface::Instance {
        &self.scope.surface_loader
    }

    pub(crate) fn swapchain_loader(&self) -> &swapchain::Device {
        &self.swapchain_loader
    }
}

impl Drop for VkContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
        }
        // scope drops next: surface, messenger, instance
    }
}

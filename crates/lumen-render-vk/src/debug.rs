// SPDX-License-Identifier: CEPL-1.0
//! Validation layer and debug messenger (debug builds only).

use std::ffi::{c_char, CStr};

use anyhow::Result;
use ash::ext::debug_utils;
use ash::{vk, Entry, Instance};
use tracing::{debug, error, info, warn};

pub(crate) const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() || (*data).p_message.is_null() {
        return vk::FALSE;
    }
    let msg = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{:?}: {}", types, msg);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{:?}: {}", types, msg);
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        info!(target: "vulkan", "{:?}: {}", types, msg);
    } else {
        debug!(target: "vulkan", "{:?}: {}", types, msg);
    }
    vk::FALSE
}

/// Layers and extensions to enable at instance creation.
pub(crate) struct ValidationRequest {
    pub layers: Vec<*const c_char>,
    pub extensions: Vec<*const c_char>,
}

impl ValidationRequest {
    pub(crate) fn enabled(&self) -> bool {
        !self.layers.is_empty()
    }
}

/// Validation only in debug builds and only when the layer is installed.
pub(crate) unsafe fn validation_request(entry: &Entry) -> ValidationRequest {
    let mut request = ValidationRequest {
        layers: Vec::new(),
        extensions: Vec::new(),
    };
    if !cfg!(debug_assertions) {
        return request;
    }

    let available = entry
        .enumerate_instance_layer_properties()
        .unwrap_or_default()
        .iter()
        .any(|layer| CStr::from_ptr(layer.layer_name.as_ptr()) == VALIDATION_LAYER);
    if available {
        request.layers.push(VALIDATION_LAYER.as_ptr());
        request.extensions.push(debug_utils::NAME.as_ptr());
    } else {
        warn!("{:?} not installed; running without validation", VALIDATION_LAYER);
    }
    request
}

/// Instance-scoped messenger, destroyed by [`Messenger::destroy`].
pub(crate) struct Messenger {
    loader: debug_utils::Instance,
    handle: vk::DebugUtilsMessengerEXT,
}

impl Messenger {
    pub(crate) unsafe fn new(entry: &Entry, instance: &Instance) -> Result<Self> {
        let loader = debug_utils::Instance::new(entry, instance);
        let ci = vk::DebugUtilsMessengerCreateInfoEXT {
            s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
            message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            pfn_user_callback: Some(debug_callback),
            ..Default::default()
        };
        let handle = loader.create_debug_utils_messenger(&ci, None)?;
        Ok(Self { loader, handle })
    }

    /// Must run before the instance is destroyed.
    pub(crate) unsafe fn destroy(&self) {
        self.loader.destroy_debug_utils_messenger(self.handle, None);
    }
}

//! Build script for fencealloc.
//!
//! Prints feature notes for users integrating fencealloc into their projects.

use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_GPU_VULKAN");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_LOG");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_TRACY");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_PARKING_LOT");
    println!("cargo:rerun-if-env-changed=FENCEALLOC_STRICT");

    let vulkan_enabled = env::var("CARGO_FEATURE_GPU_VULKAN").is_ok();
    let log_enabled = env::var("CARGO_FEATURE_LOG").is_ok();
    let tracy_enabled = env::var("CARGO_FEATURE_TRACY").is_ok();
    let parking_lot_enabled = env::var("CARGO_FEATURE_PARKING_LOT").is_ok();

    let profile = env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    let is_release = profile == "release";

    // =========================================================================
    // Feature-specific notes
    // =========================================================================

    if vulkan_enabled {
        emit_info("Vulkan backend enabled");
        emit_note("The device needs the bufferDeviceAddress and timelineSemaphore features:");
        emit_note("  let backend = VulkanBackend::new(&instance, device, physical_device, None)?;");
        emit_note("  let mut queue = backend.queue(graphics_queue);");
    }

    if log_enabled {
        emit_info("log integration enabled (page lifecycle at debug, suballocations at trace)");
    }

    if tracy_enabled {
        emit_info("Tracy profiler integration enabled (page counts per state are plotted)");
    }

    if parking_lot_enabled {
        emit_info("Using parking_lot for mutexes");
    }

    // =========================================================================
    // Release build checks
    // =========================================================================

    if is_release {
        if let Ok(strict) = env::var("FENCEALLOC_STRICT") {
            let fatal = matches!(
                strict.to_lowercase().as_str(),
                "1" | "error" | "true" | "2" | "warning" | "all"
            );
            if fatal {
                emit_warning(&format!(
                    "FENCEALLOC_STRICT={} is set for a release build; diagnostics will panic",
                    strict
                ));
            }
        }
    }
}

fn emit_info(msg: &str) {
    println!("cargo:warning=[fencealloc] {}", msg);
}

fn emit_note(msg: &str) {
    println!("cargo:warning=[fencealloc]    {}", msg);
}

fn emit_warning(msg: &str) {
    println!("cargo:warning=[fencealloc] warning: {}", msg);
}

//! Vulkan error taxonomy and the fatal-error path

use ash::vk;

/// Vulkan-specific error types
#[derive(thiserror::Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A fence did not signal within the allowed time
    #[error("Fence wait timed out during {operation}")]
    FenceTimeout {
        /// The operation that was waiting
        operation: &'static str,
    },

    /// The device was lost while performing an operation
    #[error("Device lost during {operation}")]
    DeviceLost {
        /// The operation that observed the loss
        operation: &'static str,
    },

    /// The device rejected a pipeline state combination
    #[error("Pipeline compilation failed: {reason}")]
    PipelineCompilation {
        /// What was wrong with the configuration
        reason: String,
    },

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Memory allocation failed
    #[error("Out of memory: {requested} bytes")]
    OutOfMemory {
        /// Number of bytes that were requested
        requested: u64,
    },

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Reading a shader or asset file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

impl VulkanError {
    /// Map a fence wait result, turning timeouts and device loss into their
    /// dedicated variants
    pub fn from_wait(result: vk::Result, operation: &'static str) -> Self {
        match result {
            vk::Result::TIMEOUT => Self::FenceTimeout { operation },
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost { operation },
            other => Self::Api(other),
        }
    }

    /// Map an allocation result, reporting exhaustion with the requested size
    pub fn from_allocation(result: vk::Result, requested: u64) -> Self {
        match result {
            vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::OutOfMemory { requested }
            }
            other => Self::Api(other),
        }
    }

    /// Whether the GPU state is unknown after this error
    ///
    /// Fatal errors cannot be contained mid-frame; the process should log and
    /// terminate through [`fatal::check`].
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::FenceTimeout { .. } | Self::DeviceLost { .. } => true,
            Self::Api(result) => !matches!(
                *result,
                vk::Result::ERROR_OUT_OF_HOST_MEMORY | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
            ),
            _ => false,
        }
    }
}

/// Fatal error handling for failures the renderer cannot recover from
pub mod fatal {
    use super::{VulkanError, VulkanResult};

    /// Unwrap a result or log a diagnostic and abort the process
    ///
    /// The diagnostic names the failing operation and the error code.
    pub fn check<T>(result: VulkanResult<T>, operation: &str) -> T {
        match result {
            Ok(value) => value,
            Err(error) => abort(&error, operation),
        }
    }

    /// Log `error` against `operation` and terminate
    ///
    /// Nothing the failed operation touched is released: the GPU may still
    /// be using it.
    pub fn abort(error: &VulkanError, operation: &str) -> ! {
        log::error!("Vulkan error during {operation}: {error}");
        // Unit tests unwind instead so they can inspect what was left alive
        #[cfg(test)]
        panic!("fatal Vulkan error during {operation}: {error}");
        #[cfg(not(test))]
        std::process::abort();
    }
}
